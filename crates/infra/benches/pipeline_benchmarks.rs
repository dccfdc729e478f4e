use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;
use serde_json::Value as JsonValue;

use stockflow_core::{AggregateId, TenantId};
use stockflow_events::{EventEnvelope, InMemoryEventBus};
use stockflow_infra::command_dispatcher::CommandDispatcher;
use stockflow_infra::event_store::InMemoryEventStore;
use stockflow_orders::{
    AddLine, CreateSalesOrder, PipelineStage, RecordLineQuantity, SalesOrder, SalesOrderCommand,
    SalesOrderId, SalesOrderStatus,
};

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;

fn dispatcher() -> Dispatcher {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());
    CommandDispatcher::new(store, bus)
}

fn dispatch(d: &Dispatcher, tenant_id: TenantId, order_id: SalesOrderId, cmd: SalesOrderCommand) {
    d.dispatch(tenant_id, order_id.0, "orders.sales_order", cmd, |_, id| {
        SalesOrder::empty(SalesOrderId::new(id))
    })
    .unwrap();
}

fn create_order_with_line(d: &Dispatcher, tenant_id: TenantId) -> SalesOrderId {
    let order_id = SalesOrderId::new(AggregateId::new());
    dispatch(
        d,
        tenant_id,
        order_id,
        SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
            tenant_id,
            order_id,
            display_id: format!("SO-{}", order_id.0),
            customer_id: None,
            occurred_at: Utc::now(),
        }),
    );
    dispatch(
        d,
        tenant_id,
        order_id,
        SalesOrderCommand::AddLine(AddLine {
            tenant_id,
            order_id,
            item_id: None,
            item_name: "Widget A".to_string(),
            sku: None,
            quantity: 1_000_000,
            unit_price: dec!(100),
            discount_percent: dec!(0),
            tax_rate: dec!(0),
            occurred_at: Utc::now(),
        }),
    );
    dispatch(
        d,
        tenant_id,
        order_id,
        SalesOrderCommand::ChangeOrderStatus(stockflow_orders::ChangeOrderStatus {
            tenant_id,
            order_id,
            next: SalesOrderStatus::Submitted,
            occurred_at: Utc::now(),
        }),
    );
    order_id
}

/// Naive CRUD baseline: direct key-value counter updates, no events, no history.
#[derive(Debug, Default)]
struct NaiveCounterStore {
    inner: RwLock<HashMap<(TenantId, AggregateId), u32>>,
}

impl NaiveCounterStore {
    fn set(&self, tenant_id: TenantId, order_id: AggregateId, allocated: u32) {
        let mut map = self.inner.write().unwrap();
        map.insert((tenant_id, order_id), allocated);
    }
}

fn bench_order_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("dispatch_create_with_line", |b| {
        let d = dispatcher();
        let tenant_id = TenantId::new();
        b.iter(|| {
            black_box(create_order_with_line(&d, tenant_id));
        });
    });

    group.finish();
}

fn bench_quantity_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantity_recording");

    for advances in [16u32, 64, 256] {
        group.throughput(Throughput::Elements(advances as u64));

        group.bench_with_input(
            BenchmarkId::new("event_sourced", advances),
            &advances,
            |b, &advances| {
                b.iter_batched(
                    || {
                        let d = dispatcher();
                        let tenant_id = TenantId::new();
                        let order_id = create_order_with_line(&d, tenant_id);
                        (d, tenant_id, order_id)
                    },
                    |(d, tenant_id, order_id)| {
                        for n in 1..=advances {
                            dispatch(
                                &d,
                                tenant_id,
                                order_id,
                                SalesOrderCommand::RecordLineQuantity(RecordLineQuantity {
                                    tenant_id,
                                    order_id,
                                    line_no: 1,
                                    stage: PipelineStage::Allocated,
                                    quantity: n,
                                    occurred_at: Utc::now(),
                                }),
                            );
                        }
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("naive_crud", advances),
            &advances,
            |b, &advances| {
                let store = NaiveCounterStore::default();
                let tenant_id = TenantId::new();
                let order_id = AggregateId::new();
                b.iter(|| {
                    for n in 1..=advances {
                        store.set(tenant_id, order_id, black_box(n));
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_order_creation, bench_quantity_recording);
criterion_main!(benches);
