use rust_decimal_macros::dec;
use std::sync::Arc;
use teller::{Amount, Balance, Bank, BankError, CoreConfig, Currency, UserId};

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn eur() -> Currency {
    Currency::new("EUR").unwrap()
}

fn amount(value: rust_decimal::Decimal) -> Amount {
    Amount::new(value).unwrap()
}

/// Retries an operation while it bounces off the backlog cap.
async fn with_retry<F, Fut>(mut op: F) -> teller::Result<Balance>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = teller::Result<Balance>>,
{
    loop {
        match op().await {
            Err(BankError::TooManyRequestsToUser) => tokio::task::yield_now().await,
            other => return other,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposits_all_apply_exactly_once() {
    let bank = Arc::new(Bank::new(CoreConfig::default()));
    bank.create_user(user("alice")).unwrap();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let bank = Arc::clone(&bank);
        handles.push(tokio::spawn(async move {
            let id = user("alice");
            with_retry(|| bank.deposit(&id, amount(dec!(1.0)), eur())).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        bank.balance(&user("alice"), eur()).await.unwrap(),
        Balance::new(dec!(100.0))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_never_go_negative() {
    let bank = Arc::new(Bank::new(CoreConfig::default()));
    bank.create_user(user("alice")).unwrap();
    bank.deposit(&user("alice"), amount(dec!(50.0)), eur())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let bank = Arc::clone(&bank);
        handles.push(tokio::spawn(async move {
            let id = user("alice");
            with_retry(|| bank.withdraw(&id, amount(dec!(5.0)), eur())).await
        }));
    }

    let mut succeeded = 0u32;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(BankError::NotEnoughMoney) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Ten withdrawals of 5 drain exactly 50; the rest must bounce.
    assert_eq!(succeeded, 10);
    assert_eq!(
        bank.balance(&user("alice"), eur()).await.unwrap(),
        Balance::ZERO
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transfer_storm_accounting_balances() {
    let bank = Arc::new(Bank::new(CoreConfig::default()));
    bank.create_user(user("alice")).unwrap();
    bank.create_user(user("bob")).unwrap();
    bank.deposit(&user("alice"), amount(dec!(100.0)), eur())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let bank = Arc::clone(&bank);
        handles.push(tokio::spawn(async move {
            bank.send(&user("alice"), &user("bob"), amount(dec!(1.0)), eur())
                .await
        }));
    }

    let mut transferred = 0u32;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => transferred += 1,
            Err(BankError::TooManyRequestsToSender)
            | Err(BankError::TooManyRequestsToReceiver) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Every rejected transfer left the sender undiminished.
    let alice = bank.balance(&user("alice"), eur()).await.unwrap();
    let bob = bank.balance(&user("bob"), eur()).await.unwrap();
    assert_eq!(alice, Balance::new(dec!(100.0) - rust_decimal::Decimal::from(transferred)));
    assert_eq!(bob, Balance::new(rust_decimal::Decimal::from(transferred)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_have_a_single_winner() {
    let bank = Arc::new(Bank::new(CoreConfig::default()));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let bank = Arc::clone(&bank);
        handles.push(tokio::spawn(async move { bank.create_user(user("alice")) }));
    }

    let mut created = 0u32;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => created += 1,
            Err(BankError::UserAlreadyExists) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_users_do_not_contend_with_each_other() {
    let bank = Arc::new(Bank::new(CoreConfig::default()));
    for i in 0..10 {
        bank.create_user(user(&format!("user-{i}"))).unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..10 {
        let bank = Arc::clone(&bank);
        handles.push(tokio::spawn(async move {
            let id = user(&format!("user-{i}"));
            for _ in 0..5 {
                with_retry(|| bank.deposit(&id, amount(dec!(2.0)), eur()))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..10 {
        assert_eq!(
            bank.balance(&user(&format!("user-{i}")), eur())
                .await
                .unwrap(),
            Balance::new(dec!(10.0))
        );
    }
}
