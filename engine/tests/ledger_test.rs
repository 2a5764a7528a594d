//! Integration tests for the ledger engine over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ledgercore_common::{AccountNumber, Amount, LedgerError, Result};
use ledgercore_engine::store::memory::MemUnit;
use ledgercore_engine::{
    AccessMode, Ledger, LedgerConfig, LedgerEngine, Logged, MemStore, RegisterRequest,
    Registration, Store, TransactionKind,
};

fn amount(s: &str) -> Amount {
    Amount::parse(s).unwrap()
}

fn engine_with(store: MemStore) -> LedgerEngine<MemStore> {
    LedgerEngine::new(store, LedgerConfig::default())
}

fn request(phone: &str) -> RegisterRequest {
    RegisterRequest {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        phone_number: phone.to_string(),
        email: format!("user{phone}@example.com"),
        password: "correct horse battery staple".to_string(),
    }
}

async fn register(ledger: &impl Ledger, phone: &str) -> Registration {
    ledger.register(request(phone)).await.unwrap()
}

#[tokio::test]
async fn test_register_creates_zero_balance_account() {
    let engine = engine_with(MemStore::new());

    let registration = register(&engine, "5550000001").await;
    assert_eq!(registration.balance, Amount::ZERO);
    assert!(registration.account_number.is_valid());

    let account = engine.get_account(&registration.account_number).await.unwrap();
    assert_eq!(account.balance, Amount::ZERO);
    assert_eq!(account.user_id, registration.user_id);

    let user = engine.get_user(registration.user_id).await.unwrap();
    assert_eq!(user.phone_number, "5550000001");
    assert_eq!(user.account.id, registration.account_id);
}

#[tokio::test]
async fn test_duplicate_registration_leaves_no_partial_row() {
    let engine = engine_with(MemStore::new());

    register(&engine, "5550000001").await;
    let before = engine.get_users().await.unwrap().len();

    let err = engine.register(request("5550000001")).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::UserAlreadyExists { ref phone_number } if phone_number == "5550000001"
    ));

    assert_eq!(engine.get_users().await.unwrap().len(), before);
}

#[tokio::test]
async fn test_deposit_credits_and_records() {
    let engine = engine_with(MemStore::new());
    let registration = register(&engine, "5550000001").await;
    let account = &registration.account_number;

    let record = engine.deposit(account, amount("100.00")).await.unwrap();
    assert_eq!(record.kind, TransactionKind::Deposit);
    assert_eq!(record.amount, amount("100.00"));
    assert_eq!(record.to_account, *account);
    assert!(record.from_account.is_none());

    let balance = engine.get_account(account).await.unwrap().balance;
    assert_eq!(balance, amount("100.00"));

    let history = engine.get_transaction_history(account).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], record);
}

#[tokio::test]
async fn test_charge_uses_its_own_kind() {
    let engine = engine_with(MemStore::new());
    let registration = register(&engine, "5550000001").await;

    let record = engine
        .charge(&registration.account_number, amount("9.99"))
        .await
        .unwrap();
    assert_eq!(record.kind, TransactionKind::Charge);
}

#[tokio::test]
async fn test_invalid_amounts_rejected() {
    let engine = engine_with(MemStore::new());
    let registration = register(&engine, "5550000001").await;
    let account = &registration.account_number;

    for bad in [Amount::ZERO, Amount::ZERO - amount("5.00")] {
        let err = engine.deposit(account, bad).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));

        let err = engine
            .transfer(account, &AccountNumber::new("999"), bad)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
    }

    assert!(engine.get_transaction_history(account).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deposit_to_unknown_account() {
    let engine = engine_with(MemStore::new());
    let missing = AccountNumber::new("0000000000000000");

    let err = engine.deposit(&missing, amount("1.00")).await.unwrap_err();
    assert!(matches!(err, LedgerError::NoAccount(ref n) if *n == missing));
}

#[tokio::test]
async fn test_transfer_reports_missing_source_first() {
    let engine = engine_with(MemStore::new());
    let registration = register(&engine, "5550000001").await;

    let missing_a = AccountNumber::new("1111111111111111");
    let missing_b = AccountNumber::new("9999999999999999");

    // both sides missing: the source is named
    let err = engine
        .transfer(&missing_a, &missing_b, amount("1.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NoAccount(ref n) if *n == missing_a));

    // source exists, destination missing: the destination is named
    let err = engine
        .transfer(&registration.account_number, &missing_b, amount("1.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NoAccount(ref n) if *n == missing_b));
}

#[tokio::test]
async fn test_transfer_scenario() {
    let engine = engine_with(MemStore::new());
    let u1 = register(&engine, "5550000001").await;
    let u2 = register(&engine, "5550000002").await;

    engine.deposit(&u1.account_number, amount("100.00")).await.unwrap();

    let record = engine
        .transfer(&u1.account_number, &u2.account_number, amount("40.00"))
        .await
        .unwrap();
    assert_eq!(record.kind, TransactionKind::Transfer);
    assert_eq!(record.from_account.as_ref(), Some(&u1.account_number));
    assert_eq!(record.to_account, u2.account_number);

    let b1 = engine.get_account(&u1.account_number).await.unwrap().balance;
    let b2 = engine.get_account(&u2.account_number).await.unwrap().balance;
    assert_eq!(b1, amount("60.00"));
    assert_eq!(b2, amount("40.00"));

    // one logical event, visible from both histories with the same id and
    // timestamp
    let h1 = engine.get_transaction_history(&u1.account_number).await.unwrap();
    let h2 = engine.get_transaction_history(&u2.account_number).await.unwrap();
    let t1 = h1.iter().find(|r| r.kind == TransactionKind::Transfer).unwrap();
    let t2 = h2.iter().find(|r| r.kind == TransactionKind::Transfer).unwrap();
    assert_eq!(t1.id, record.id);
    assert_eq!(t2.id, record.id);
    assert_eq!(t1.created_at, t2.created_at);

    // overdraw attempt carries the balance and the requested amount
    let err = engine
        .transfer(&u1.account_number, &u2.account_number, amount("1000.00"))
        .await
        .unwrap_err();
    match err {
        LedgerError::InsufficientFunds { balance, requested } => {
            assert_eq!(balance, amount("60.00"));
            assert_eq!(requested, amount("1000.00"));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    // rejected transfer left everything untouched
    assert_eq!(
        engine.get_account(&u1.account_number).await.unwrap().balance,
        amount("60.00")
    );
    assert_eq!(
        engine.get_account(&u2.account_number).await.unwrap().balance,
        amount("40.00")
    );
    assert_eq!(
        engine.get_transaction_history(&u1.account_number).await.unwrap(),
        h1
    );
    assert_eq!(
        engine.get_transaction_history(&u2.account_number).await.unwrap(),
        h2
    );
}

#[tokio::test]
async fn test_transfer_conserves_funds() {
    let engine = engine_with(MemStore::new());
    let u1 = register(&engine, "5550000001").await;
    let u2 = register(&engine, "5550000002").await;

    engine.deposit(&u1.account_number, amount("10.01")).await.unwrap();
    engine.deposit(&u2.account_number, amount("0.99")).await.unwrap();

    let before = engine.get_account(&u1.account_number).await.unwrap().balance
        + engine.get_account(&u2.account_number).await.unwrap().balance;

    engine
        .transfer(&u1.account_number, &u2.account_number, amount("3.33"))
        .await
        .unwrap();

    let after = engine.get_account(&u1.account_number).await.unwrap().balance
        + engine.get_account(&u2.account_number).await.unwrap().balance;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_self_transfer_leaves_balance_unchanged() {
    let engine = engine_with(MemStore::new());
    let u1 = register(&engine, "5550000001").await;

    engine.deposit(&u1.account_number, amount("50.00")).await.unwrap();
    engine
        .transfer(&u1.account_number, &u1.account_number, amount("20.00"))
        .await
        .unwrap();

    assert_eq!(
        engine.get_account(&u1.account_number).await.unwrap().balance,
        amount("50.00")
    );

    // still funds-checked
    let err = engine
        .transfer(&u1.account_number, &u1.account_number, amount("80.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
}

#[tokio::test]
async fn test_history_is_most_recent_first() {
    let engine = engine_with(MemStore::new());
    let u1 = register(&engine, "5550000001").await;
    let account = &u1.account_number;

    assert!(engine.get_transaction_history(account).await.unwrap().is_empty());

    engine.deposit(account, amount("1.00")).await.unwrap();
    engine.deposit(account, amount("2.00")).await.unwrap();
    engine.deposit(account, amount("3.00")).await.unwrap();

    let history = engine.get_transaction_history(account).await.unwrap();
    let amounts: Vec<Amount> = history.iter().map(|r| r.amount).collect();
    assert_eq!(
        amounts,
        vec![amount("3.00"), amount("2.00"), amount("1.00")]
    );
    assert!(history.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn test_reads_are_idempotent() {
    let engine = engine_with(MemStore::new());
    let u1 = register(&engine, "5550000001").await;
    engine.deposit(&u1.account_number, amount("5.00")).await.unwrap();

    let first_account = engine.get_account(&u1.account_number).await.unwrap();
    let first_history = engine.get_transaction_history(&u1.account_number).await.unwrap();

    for _ in 0..3 {
        let account = engine.get_account(&u1.account_number).await.unwrap();
        assert_eq!(account.balance, first_account.balance);
        assert_eq!(
            engine.get_transaction_history(&u1.account_number).await.unwrap(),
            first_history
        );
    }
}

#[tokio::test]
async fn test_delete_user_cascades_to_account_not_log() {
    let engine = engine_with(MemStore::new());
    let u1 = register(&engine, "5550000001").await;
    let u2 = register(&engine, "5550000002").await;

    engine.deposit(&u1.account_number, amount("10.00")).await.unwrap();
    engine
        .transfer(&u1.account_number, &u2.account_number, amount("4.00"))
        .await
        .unwrap();

    engine.delete_user(u1.user_id).await.unwrap();

    let err = engine.get_user(u1.user_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::NoUser(id) if id == u1.user_id));
    let err = engine.get_account(&u1.account_number).await.unwrap_err();
    assert!(matches!(err, LedgerError::NoAccount(_)));

    // the counterparty still sees the shared transfer record
    let h2 = engine.get_transaction_history(&u2.account_number).await.unwrap();
    assert_eq!(h2.len(), 1);

    // deleting again reports the missing user
    let err = engine.delete_user(u1.user_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::NoUser(_)));
}

#[tokio::test]
async fn test_concurrent_transfers_cannot_double_spend() {
    let store = MemStore::new();
    let engine = Arc::new(engine_with(store));

    let source = register(engine.as_ref(), "5550000001").await;
    let dest_a = register(engine.as_ref(), "5550000002").await;
    let dest_b = register(engine.as_ref(), "5550000003").await;

    // balance is exactly one transfer's worth
    engine
        .deposit(&source.account_number, amount("100.00"))
        .await
        .unwrap();

    let t1 = {
        let engine = engine.clone();
        let from = source.account_number.clone();
        let to = dest_a.account_number.clone();
        tokio::spawn(async move { engine.transfer(&from, &to, amount("100.00")).await })
    };
    let t2 = {
        let engine = engine.clone();
        let from = source.account_number.clone();
        let to = dest_b.account_number.clone();
        tokio::spawn(async move { engine.transfer(&from, &to, amount("100.00")).await })
    };

    let results = [t1.await.unwrap(), t2.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(insufficient, 1);

    // exactly one destination was credited, the source is empty
    let b_source = engine.get_account(&source.account_number).await.unwrap().balance;
    let b_a = engine.get_account(&dest_a.account_number).await.unwrap().balance;
    let b_b = engine.get_account(&dest_b.account_number).await.unwrap().balance;
    assert_eq!(b_source, Amount::ZERO);
    assert_eq!(b_a + b_b, amount("100.00"));
}

/// Store wrapper that delays every unit, to exercise the operation deadline.
#[derive(Clone)]
struct SlowStore {
    inner: MemStore,
    delay: Duration,
}

#[async_trait]
impl Store for SlowStore {
    type Unit = MemUnit;

    async fn begin(&self, mode: AccessMode) -> Result<Self::Unit> {
        tokio::time::sleep(self.delay).await;
        self.inner.begin(mode).await
    }
}

#[tokio::test]
async fn test_deadline_aborts_without_partial_effect() {
    let store = MemStore::new();
    let fast = engine_with(store.clone());
    let registration = register(&fast, "5550000001").await;
    fast.deposit(&registration.account_number, amount("10.00"))
        .await
        .unwrap();

    let slow = LedgerEngine::new(
        SlowStore {
            inner: store.clone(),
            delay: Duration::from_millis(200),
        },
        LedgerConfig {
            operation_deadline: Duration::from_millis(50),
            ..LedgerConfig::default()
        },
    );

    let err = slow
        .deposit(&registration.account_number, amount("5.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DeadlineExceeded { operation: "deposit" }));
    assert!(err.is_retryable());

    // the timed-out unit left nothing behind
    assert_eq!(
        fast.get_account(&registration.account_number).await.unwrap().balance,
        amount("10.00")
    );
    assert_eq!(
        fast.get_transaction_history(&registration.account_number)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_logged_decorator_is_transparent() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let engine = Logged::new(engine_with(MemStore::new()));

    let u1 = register(&engine, "5550000001").await;
    engine.deposit(&u1.account_number, amount("2.50")).await.unwrap();
    assert_eq!(
        engine.get_account(&u1.account_number).await.unwrap().balance,
        amount("2.50")
    );

    // errors pass through untouched
    let err = engine
        .deposit(&u1.account_number, Amount::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount { .. }));
}

#[tokio::test]
async fn test_history_limit_is_applied() {
    let store = MemStore::new();
    let engine = LedgerEngine::new(
        store,
        LedgerConfig {
            history_limit: Some(2),
            ..LedgerConfig::default()
        },
    );

    let u1 = register(&engine, "5550000001").await;
    for cents in [100, 200, 300] {
        engine
            .deposit(&u1.account_number, Amount::from_cents(cents))
            .await
            .unwrap();
    }

    let history = engine.get_transaction_history(&u1.account_number).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, Amount::from_cents(300));
}
