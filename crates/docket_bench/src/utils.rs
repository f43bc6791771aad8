//! Benchmark utilities.

use docket_codec::{doc, Document, Value};
use docket_core::{Database, Table};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tempfile::TempDir;

/// Categories the generated products are spread over.
pub const CATEGORIES: [&str; 4] = ["laptops", "phones", "mice", "cables"];

/// Generate a random product document keyed `P<n>` with roughly
/// `text_len` bytes of description.
pub fn random_product(n: usize, text_len: usize) -> Document {
    let mut rng = rand::thread_rng();
    let description: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(text_len)
        .map(char::from)
        .collect();
    doc! {
        "id" => format!("P{n}"),
        "price" => rng.gen_range(1..5_000),
        "category" => CATEGORIES[rng.gen_range(0..CATEGORIES.len())],
        "rating" => rng.gen_range(0.0..5.0),
        "description" => description,
    }
}

/// Key of the `n`th generated product.
pub fn product_key(n: usize) -> Value {
    Value::Text(format!("P{n}"))
}

/// A database in a temporary directory with a `products` table indexed on
/// `category`, preloaded with `count` products.
pub fn products_db(count: usize) -> (TempDir, Database, Arc<Table>) {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::open(dir.path()).expect("open database");
    let products = db
        .create_table("products", "id", &["category"])
        .expect("create table");
    for n in 0..count {
        products.insert(random_product(n, 64), None).expect("insert");
    }
    (dir, db, products)
}
