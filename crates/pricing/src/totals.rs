use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ValueObject};

/// Monetary breakdown of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub line_total: Decimal,
}

impl ValueObject for LineTotals {}

impl LineTotals {
    pub const ZERO: LineTotals = LineTotals {
        subtotal: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        line_total: Decimal::ZERO,
    };
}

/// Monetary roll-up of a whole document (element-wise sum of its lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub total_tax: Decimal,
    pub total: Decimal,
}

impl ValueObject for DocumentTotals {}

impl DocumentTotals {
    pub const ZERO: DocumentTotals = DocumentTotals {
        subtotal: Decimal::ZERO,
        total_discount: Decimal::ZERO,
        total_tax: Decimal::ZERO,
        total: Decimal::ZERO,
    };
}

/// Pricing inputs of one line, independent of which document owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Percentage, e.g. `10` means 10%.
    pub discount_percent: Decimal,
    /// Percentage, applied to the post-discount amount.
    pub tax_rate: Decimal,
}

impl LineInput {
    pub fn new(quantity: u32, unit_price: Decimal) -> Self {
        Self {
            quantity,
            unit_price,
            discount_percent: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
        }
    }

    pub fn with_discount(mut self, discount_percent: Decimal) -> Self {
        self.discount_percent = discount_percent;
        self
    }

    pub fn with_tax(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }
}

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Compute the monetary breakdown of a single line.
///
/// - `subtotal   = quantity * unit_price`
/// - `discount   = subtotal * discount_percent / 100`
/// - `tax        = (subtotal - discount) * tax_rate / 100`
/// - `line_total = subtotal - discount + tax`
///
/// Tax applies to the post-discount amount. All outputs are non-negative for
/// non-negative inputs; zero quantity or zero price yields all zeros.
///
/// Negative prices or rates, and discounts above 100%, are rejected rather
/// than silently clamped.
pub fn line_total(input: &LineInput) -> DomainResult<LineTotals> {
    if input.unit_price < Decimal::ZERO {
        return Err(DomainError::validation("unit_price cannot be negative"));
    }
    if input.discount_percent < Decimal::ZERO || input.discount_percent > HUNDRED {
        return Err(DomainError::validation(
            "discount_percent must be between 0 and 100",
        ));
    }
    if input.tax_rate < Decimal::ZERO {
        return Err(DomainError::validation("tax_rate cannot be negative"));
    }

    let subtotal = Decimal::from(input.quantity) * input.unit_price;
    let discount_amount = subtotal * input.discount_percent / HUNDRED;
    let after_discount = subtotal - discount_amount;
    let tax_amount = after_discount * input.tax_rate / HUNDRED;

    Ok(LineTotals {
        subtotal,
        discount_amount,
        tax_amount,
        line_total: after_discount + tax_amount,
    })
}

/// Element-wise sum of `line_total` over every line.
///
/// `total = subtotal - total_discount + total_tax`. An empty line list yields
/// all zeros.
pub fn document_totals<'a>(
    lines: impl IntoIterator<Item = &'a LineInput>,
) -> DomainResult<DocumentTotals> {
    let mut acc = DocumentTotals::ZERO;
    for line in lines {
        let lt = line_total(line)?;
        acc.subtotal += lt.subtotal;
        acc.total_discount += lt.discount_amount;
        acc.total_tax += lt.tax_amount;
    }
    acc.total = acc.subtotal - acc.total_discount + acc.total_tax;
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line(quantity: u32, unit_price: Decimal) -> LineInput {
        LineInput::new(quantity, unit_price)
    }

    #[test]
    fn quantity_times_price_with_no_discount_or_tax() {
        let t = line_total(&line(5, dec!(100))).unwrap();
        assert_eq!(t.subtotal, dec!(500));
        assert_eq!(t.discount_amount, dec!(0));
        assert_eq!(t.tax_amount, dec!(0));
        assert_eq!(t.line_total, dec!(500));
    }

    #[test]
    fn discount_percentage_reduces_line_total() {
        let t = line_total(&line(5, dec!(100)).with_discount(dec!(10))).unwrap();
        assert_eq!(t.subtotal, dec!(500));
        assert_eq!(t.discount_amount, dec!(50));
        assert_eq!(t.line_total, dec!(450));
    }

    #[test]
    fn tax_rate_increases_line_total() {
        let t = line_total(&line(5, dec!(100)).with_tax(dec!(8))).unwrap();
        assert_eq!(t.subtotal, dec!(500));
        assert_eq!(t.tax_amount, dec!(40));
        assert_eq!(t.line_total, dec!(540));
    }

    #[test]
    fn discount_applies_before_tax() {
        // 10% discount on 500 = 450, then 8% tax on 450 = 36, total 486.
        let t = line_total(&line(5, dec!(100)).with_discount(dec!(10)).with_tax(dec!(8))).unwrap();
        assert_eq!(t.subtotal, dec!(500));
        assert_eq!(t.discount_amount, dec!(50));
        assert_eq!(t.tax_amount, dec!(36));
        assert_eq!(t.line_total, dec!(486));
    }

    #[test]
    fn zero_quantity_yields_all_zeros() {
        let t = line_total(&line(0, dec!(100))).unwrap();
        assert_eq!(t, LineTotals::ZERO);
    }

    #[test]
    fn zero_price_yields_all_zeros() {
        let t = line_total(&line(10, dec!(0))).unwrap();
        assert_eq!(t, LineTotals::ZERO);
    }

    #[test]
    fn full_discount_zeroes_the_line() {
        let t = line_total(&line(5, dec!(100)).with_discount(dec!(100))).unwrap();
        assert_eq!(t.subtotal, dec!(500));
        assert_eq!(t.discount_amount, dec!(500));
        assert_eq!(t.line_total, dec!(0));
    }

    #[test]
    fn fractional_prices_stay_exact() {
        let t = line_total(&line(3, dec!(33.33)).with_discount(dec!(10))).unwrap();
        assert_eq!(t.subtotal, dec!(99.99));
        assert_eq!(t.discount_amount, dec!(9.999));
        assert_eq!(t.line_total, dec!(89.991));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = line_total(&line(1, dec!(-5))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn discount_above_hundred_percent_is_rejected() {
        let err = line_total(&line(1, dec!(5)).with_discount(dec!(101))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn document_totals_sum_over_lines() {
        let lines = [line(5, dec!(100)), line(3, dec!(200))];
        let t = document_totals(&lines).unwrap();
        assert_eq!(t.subtotal, dec!(1100));
        assert_eq!(t.total, dec!(1100));
    }

    #[test]
    fn document_totals_with_discounts() {
        let lines = [
            line(5, dec!(100)).with_discount(dec!(10)), // 500 - 50 = 450
            line(3, dec!(200)).with_discount(dec!(5)),  // 600 - 30 = 570
        ];
        let t = document_totals(&lines).unwrap();
        assert_eq!(t.subtotal, dec!(1100));
        assert_eq!(t.total_discount, dec!(80));
        assert_eq!(t.total, dec!(1020));
    }

    #[test]
    fn document_totals_with_discount_and_tax() {
        let lines = [line(10, dec!(100)).with_discount(dec!(10)).with_tax(dec!(8))];
        let t = document_totals(&lines).unwrap();
        assert_eq!(t.subtotal, dec!(1000));
        assert_eq!(t.total_discount, dec!(100));
        assert_eq!(t.total_tax, dec!(72));
        assert_eq!(t.total, dec!(972));
    }

    #[test]
    fn mixed_document_summary() {
        let lines = [
            line(10, dec!(100)).with_discount(dec!(10)).with_tax(dec!(8)), // 900 + 72
            line(5, dec!(200)).with_discount(dec!(5)).with_tax(dec!(8)),   // 950 + 76
        ];
        let t = document_totals(&lines).unwrap();
        assert_eq!(t.subtotal, dec!(2000));
        assert_eq!(t.total_discount, dec!(150));
        assert_eq!(t.total_tax, dec!(148));
        assert_eq!(t.total, dec!(1998));
    }

    #[test]
    fn empty_document_is_all_zeros() {
        let t = document_totals(&[]).unwrap();
        assert_eq!(t, DocumentTotals::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: outputs are non-negative and the total identity holds
        /// for any non-negative inputs.
        #[test]
        fn line_identity_holds(
            quantity in 0u32..10_000,
            price_cents in 0i64..10_000_000,
            discount in 0i64..=100,
            tax in 0i64..50,
        ) {
            let input = LineInput::new(quantity, Decimal::new(price_cents, 2))
                .with_discount(Decimal::from(discount))
                .with_tax(Decimal::from(tax));
            let t = line_total(&input).unwrap();

            prop_assert!(t.subtotal >= Decimal::ZERO);
            prop_assert!(t.discount_amount >= Decimal::ZERO);
            prop_assert!(t.tax_amount >= Decimal::ZERO);
            prop_assert!(t.line_total >= Decimal::ZERO);
            prop_assert_eq!(
                t.line_total,
                t.subtotal - t.discount_amount + t.tax_amount
            );
        }

        /// Property: document totals equal the sum of their line breakdowns.
        #[test]
        fn document_is_additive(
            lines in prop::collection::vec((0u32..100, 0i64..1_000_00, 0i64..=100, 0i64..30), 0..8)
        ) {
            let inputs: Vec<LineInput> = lines
                .iter()
                .map(|(q, p, d, t)| {
                    LineInput::new(*q, Decimal::new(*p, 2))
                        .with_discount(Decimal::from(*d))
                        .with_tax(Decimal::from(*t))
                })
                .collect();

            let doc = document_totals(&inputs).unwrap();

            let mut subtotal = Decimal::ZERO;
            let mut discount = Decimal::ZERO;
            let mut tax = Decimal::ZERO;
            for input in &inputs {
                let lt = line_total(input).unwrap();
                subtotal += lt.subtotal;
                discount += lt.discount_amount;
                tax += lt.tax_amount;
            }

            prop_assert_eq!(doc.subtotal, subtotal);
            prop_assert_eq!(doc.total_discount, discount);
            prop_assert_eq!(doc.total_tax, tax);
            prop_assert_eq!(doc.total, subtotal - discount + tax);
        }
    }
}
