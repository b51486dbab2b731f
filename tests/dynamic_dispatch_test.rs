use order_capture::domain::Money;
use order_capture::domain::instrument::{CardBrand, CreditCard, Instrument};
use order_capture::domain::order::Order;
use order_capture::domain::ports::{
    InstrumentStoreBox, OrderStoreBox, PaymentGatewayBox, PaymentStoreBox,
};
use order_capture::domain::payment::Payment;
use order_capture::infrastructure::in_memory::InMemoryLedger;
use order_capture::infrastructure::simulated_gateway::SimulatedGateway;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let ledger = InMemoryLedger::new();
    let order_store: OrderStoreBox = Box::new(ledger.clone());
    let payment_store: PaymentStoreBox = Box::new(ledger.clone());
    let instrument_store: InstrumentStoreBox = Box::new(ledger.clone());
    let gateway: PaymentGatewayBox = Box::new(SimulatedGateway::new());

    let card = CreditCard::new(1, "4111111111111111", CardBrand::Visa, 12, 99).unwrap();
    let order = Order::new(
        1,
        Money::new(dec!(10)).unwrap(),
        Money::new(dec!(0)).unwrap(),
    )
    .unwrap();

    // Verify Send + Sync by spawning tasks
    let instrument: Instrument = tokio::spawn(async move {
        instrument_store.create_credit_card(card).await.unwrap();
        instrument_store.get_credit_card(1).await.unwrap().unwrap()
    })
    .await
    .unwrap()
    .into();

    tokio::spawn(async move { order_store.create(order).await.unwrap() })
        .await
        .unwrap();

    let payment = Payment::new(1, 1, Money::new(dec!(10)).unwrap(), "card", &instrument);
    let charged = tokio::spawn(async move {
        payment_store.create(payment.clone()).await.unwrap();
        gateway.charge(&payment, &instrument).await
    })
    .await
    .unwrap();

    assert!(charged.is_ok());
}
