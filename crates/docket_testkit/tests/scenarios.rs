//! End-to-end scenarios across tables, transactions and history.

use docket_codec::{doc, Value};
use docket_core::{CoreError, Operator, Timestamp, TransactionState};
use docket_testkit::prelude::*;

fn price(doc: &docket_codec::Document) -> Option<i64> {
    doc.get("price").and_then(Value::as_integer)
}

#[test]
fn time_travel_through_price_changes() {
    let db = TestDatabase::new();
    let products = scenarios::products(&db);
    let p1 = Value::from("P1");

    let t0 = db.now();
    products
        .insert(doc! { "id" => "P1", "name" => "Laptop", "price" => 1200, "category" => "laptops" }, None)
        .unwrap();
    let t1 = db.advance(10.0);
    products.update(&p1, doc! { "price" => 1100 }, None).unwrap();
    let t2 = db.advance(10.0);
    products.update(&p1, doc! { "price" => 1000 }, None).unwrap();

    let versions = db.versions();
    assert_eq!(versions.at("products", &p1, t0.offset(-1.0)), None);
    assert_eq!(versions.at("products", &p1, t1.offset(-0.1)).as_ref().and_then(price), Some(1200));
    assert_eq!(versions.at("products", &p1, t1.offset(0.1)).as_ref().and_then(price), Some(1100));
    assert_eq!(versions.at("products", &p1, t2).as_ref().and_then(price), Some(1000));

    let history = versions.history("products", &p1);
    let prices: Vec<_> = history.iter().filter_map(|v| price(&v.data)).collect();
    assert_eq!(prices, [1200, 1100, 1000]);
    assert_eq!(
        history.iter().map(|v| v.timestamp).collect::<Vec<_>>(),
        [t0, t1, t2]
    );

    let current = products.get(&p1).unwrap();
    assert_eq!(price(&current), Some(1000));
    assert_eq!(current.get("name"), Some(&Value::from("Laptop")));
}

#[test]
fn bank_transfer_and_rejected_overdraft() {
    let db = TestDatabase::new();
    scenarios::bank(&db);

    let tx = db.begin();
    scenarios::transfer(&db, tx, "A", "B", 200).unwrap();
    db.commit(tx).unwrap();
    assert_eq!(scenarios::balance(&db, "A"), Some(800));
    assert_eq!(scenarios::balance(&db, "B"), Some(700));

    let tx = db.begin();
    let err = scenarios::transfer(&db, tx, "A", "B", 5_000).unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation { .. }));
    assert_eq!(scenarios::balance(&db, "A"), Some(-4200), "writes are visible before rollback");

    db.rollback(tx).unwrap();
    assert_eq!(scenarios::balance(&db, "A"), Some(800));
    assert_eq!(scenarios::balance(&db, "B"), Some(700));
    assert_eq!(db.transactions().state(tx), Some(TransactionState::RolledBack));

    let stats = db.stats();
    assert_eq!(stats.transactions_started(), 3);
    assert_eq!(stats.transactions_committed(), 2);
    assert_eq!(stats.transactions_rolled_back(), 1);
}

#[test]
fn transaction_helper_rolls_back_overdraft() {
    let db = TestDatabase::new();
    scenarios::bank(&db);

    let result = db.transaction(|tx| scenarios::transfer(&db, tx, "B", "A", 501));
    assert!(result.is_err());
    assert_eq!(scenarios::balance(&db, "A"), Some(1000));
    assert_eq!(scenarios::balance(&db, "B"), Some(500));
}

#[test]
fn rollback_restores_exact_documents_across_tables() {
    let db = TestDatabase::new();
    let accounts = scenarios::bank(&db);
    let products = scenarios::products(&db);
    products.insert(doc! { "id" => "P1", "price" => 10 }, None).unwrap();
    let before_accounts = snapshot(&accounts);
    let before_products = snapshot(&products);

    let tx = db.begin();
    accounts.update(&Value::from("A"), doc! { "balance" => 1, "note" => "temp" }, Some(tx)).unwrap();
    accounts.delete(&Value::from("B"), Some(tx)).unwrap();
    products.insert(doc! { "id" => "P2", "price" => 20 }, Some(tx)).unwrap();
    products.update(&Value::from("P1"), doc! { "category" => "misc" }, Some(tx)).unwrap();
    db.rollback(tx).unwrap();

    assert_table_matches(&accounts, &before_accounts);
    assert_table_matches(&products, &before_products);
    assert!(accounts.lookup("owner", &Value::from("bob")).unwrap().len() == 1);
}

#[test]
fn commit_keeps_effects_and_ends_tracking() {
    let db = TestDatabase::new();
    let products = scenarios::products(&db);

    let tx = db.begin();
    products.insert(doc! { "id" => "P1" }, Some(tx)).unwrap();
    db.commit(tx).unwrap();

    assert!(products.get(&Value::from("P1")).is_some());
    assert!(db.rollback(tx).is_err());
    assert!(db.commit(tx).unwrap_err().to_string().contains("already committed"));
    assert!(products.get(&Value::from("P1")).is_some());
}

#[test]
fn savepoint_compensates_only_later_operations() {
    let db = TestDatabase::new();
    let products = scenarios::products(&db);

    let tx = db.begin();
    products.insert(doc! { "id" => "P1", "price" => 1 }, Some(tx)).unwrap();
    db.create_savepoint(tx, "sp").unwrap();
    products.update(&Value::from("P1"), doc! { "price" => 2 }, Some(tx)).unwrap();
    products.insert(doc! { "id" => "P2" }, Some(tx)).unwrap();

    assert_eq!(db.rollback_to_savepoint(tx, "sp").unwrap(), 2);
    assert_eq!(products.get(&Value::from("P1")), Some(doc! { "id" => "P1", "price" => 1 }));
    assert_eq!(products.get(&Value::from("P2")), None);

    db.rollback(tx).unwrap();
    assert!(products.is_empty());
}

#[test]
fn history_survives_delete() {
    let db = TestDatabase::new();
    let products = scenarios::products(&db);
    let key = Value::from("P1");

    products.insert(doc! { "id" => "P1", "price" => 5 }, None).unwrap();
    db.advance(1.0);
    products.update(&key, doc! { "price" => 6 }, None).unwrap();
    db.advance(1.0);
    products.delete(&key, None).unwrap();

    assert_eq!(products.get(&key), None);
    let history = db.versions().history("products", &key);
    assert_eq!(history.len(), 2);
    assert_eq!(price(&history[1].data), Some(6));
    assert_eq!(
        db.versions().at("products", &key, db.now()).as_ref().and_then(price),
        Some(6)
    );
}

#[test]
fn integer_and_text_keys_keep_separate_histories() {
    let db = TestDatabase::new();
    let table = db.create_table("m", "id", &[]).unwrap();

    table.insert(doc! { "id" => 1, "v" => "int" }, None).unwrap();
    table.insert(doc! { "id" => "1", "v" => "text" }, None).unwrap();
    table.update(&Value::from("1"), doc! { "v" => "text2" }, None).unwrap();

    let int_history = db.versions().history("m", &Value::Integer(1));
    assert_eq!(int_history.len(), 1);
    assert_eq!(int_history[0].data.get("v"), Some(&Value::from("int")));
    assert_eq!(db.versions().history("m", &Value::from("1")).len(), 2);
    assert_eq!(
        db.versions()
            .at("m", &Value::Integer(1), db.now())
            .and_then(|d| d.get("v").cloned()),
        Some(Value::from("int"))
    );
}

#[test]
fn generated_keys_are_unique_and_readable() {
    let db = TestDatabase::new();
    let products = scenarios::products(&db);

    let a = products.insert(doc! { "name" => "Mouse" }, None).unwrap();
    let b = products.insert(doc! { "name" => "Mouse" }, None).unwrap();
    let (ka, kb) = (a.get("id").unwrap().clone(), b.get("id").unwrap().clone());

    assert_ne!(ka, kb);
    assert_eq!(products.get(&ka), Some(a));
    assert_eq!(products.get(&kb), Some(b));
}

#[test]
fn queries_scan_current_documents() {
    let db = TestDatabase::new();
    let products = scenarios::products(&db);
    for (id, category, price) in [("P1", "laptops", 1200), ("P2", "laptops", 900), ("P3", "mice", 25)] {
        products
            .insert(doc! { "id" => id, "category" => category, "price" => price }, None)
            .unwrap();
    }
    products.update(&Value::from("P1"), doc! { "price" => 950 }, None).unwrap();

    let cheap = products
        .query()
        .filter("category", Operator::Eq, "laptops")
        .filter("price", Operator::Lt, 1000)
        .execute();
    assert_eq!(cheap.len(), 2);
    assert_eq!(db.stats().scans(), 1);

    assert!(matches!(
        products.query().filter_str("price", "~", 1),
        Err(CoreError::UnsupportedOperator { .. })
    ));
}

#[test]
fn tables_and_history_survive_reopen() {
    let mut db = TestDatabase::new();
    {
        let products = scenarios::products(&db);
        products.insert(doc! { "id" => "P1", "category" => "laptops", "price" => 1 }, None).unwrap();
        db.advance(5.0);
        products.update(&Value::from("P1"), doc! { "price" => 2 }, None).unwrap();
    }

    db.reopen();
    let products = db.table("products").unwrap();
    assert_eq!(price(&products.get(&Value::from("P1")).unwrap()), Some(2));
    assert_eq!(products.lookup("category", &Value::from("laptops")).unwrap().len(), 1);
    assert_eq!(db.versions().history("products", &Value::from("P1")).len(), 2);
    assert!(products.verify().unwrap().is_consistent());
    assert_eq!(
        db.versions()
            .at("products", &Value::from("P1"), Timestamp::from_secs(START_TIME + 1.0))
            .as_ref()
            .and_then(price),
        Some(1)
    );
}

#[test]
fn change_feed_sees_inserts_only() {
    let db = TestDatabase::new();
    let rx = db.subscribe();
    let products = scenarios::products(&db);

    products.insert(doc! { "id" => "P1" }, None).unwrap();
    products.update(&Value::from("P1"), doc! { "price" => 1 }, None).unwrap();
    products.delete(&Value::from("P1"), None).unwrap();
    products.insert(doc! { "id" => "P2" }, None).unwrap();

    let keys: Vec<Value> = rx.try_iter().map(|e| e.key).collect();
    assert_eq!(keys, [Value::from("P1"), Value::from("P2")]);
    assert_eq!(db.change_feed().poll(1, 10).len(), 1);
}
