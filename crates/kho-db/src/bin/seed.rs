//! # Seed Data Generator
//!
//! Populates a development database with a small convenience store.
//!
//! ## Usage
//! ```bash
//! # Seed ./kho_dev.db with 30 days of sales (default)
//! cargo run -p kho-db --bin seed
//!
//! # Custom number of days of sales
//! cargo run -p kho-db --bin seed -- --days 90
//!
//! # Specify database path
//! cargo run -p kho-db --bin seed -- --db ./data/kho.db
//! ```
//!
//! ## Generated Data
//! - One admin account (`admin` / `admin123`) with a profile
//! - Suppliers, categories and products
//! - One posted goods receipt per supplier (creates the batches)
//! - A few paid orders per day, settled against those batches

use std::env;

use chrono::{Duration, NaiveDate, Utc};
use kho_core::inputs::{NewAccount, NewBusiness, NewCategory, NewGoodReceipt, NewOrder, NewProduct, NewUser};
use kho_core::settlement::ShortfallPolicy;
use kho_core::{GoodReceiptItem, OrderItem, PaymentMethod, Product, Role};
use kho_db::{CrudRepository, Database, DbConfig};

/// (supplier, category, [(product, selling price in đồng)])
const CATALOG: &[(&str, &str, &[(&str, i64)])] = &[
    (
        "Vinamilk",
        "Sữa",
        &[
            ("Sữa tươi tiệt trùng 1L", 32_000),
            ("Sữa chua ăn có đường", 7_000),
            ("Sữa đặc Ông Thọ", 24_000),
        ],
    ),
    (
        "Acecook",
        "Mì gói",
        &[
            ("Mì Hảo Hảo tôm chua cay", 4_500),
            ("Phở Đệ Nhất", 9_000),
            ("Miến Phú Hương", 8_000),
        ],
    ),
    (
        "Suntory PepsiCo",
        "Nước giải khát",
        &[
            ("Pepsi lon 330ml", 10_000),
            ("Trà Ô Long Tea+", 12_000),
            ("Nước suối Aquafina 500ml", 5_000),
        ],
    ),
];

/// Units received per product.
const RECEIVED_QUANTITY: i64 = 500;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut days: i64 = 30;
    let mut db_path = String::from("./kho_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" | "-n" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kho Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --days <N>     Days of sales to generate (default: 30)");
                println!("  -d, --db <PATH>    Database file path (default: ./kho_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kho Seed Data Generator");
    println!("==========================");
    println!("Database: {}", db_path);
    println!("Days:     {}", days);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().list().await?.len();
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Staff
    let admin = db
        .accounts()
        .create(NewAccount {
            username: "admin".to_string(),
            password: "admin123".to_string(),
            role: Role::Admin,
        })
        .await?;
    db.users()
        .create(NewUser {
            account_id: admin.id.clone(),
            name: "Quản lý cửa hàng".to_string(),
            email: Some("admin@kho.vn".to_string()),
            phone: None,
            address: None,
            avatar: None,
        })
        .await?;
    println!("✓ Account admin / admin123");

    // Catalog and stock
    let mut products: Vec<Product> = Vec::new();
    for (supplier_name, category_name, items) in CATALOG {
        let supplier = db
            .businesses()
            .create(NewBusiness {
                name: supplier_name.to_string(),
                email: None,
                address: "TP. Hồ Chí Minh".to_string(),
                logo: None,
                logo_links: vec![],
            })
            .await?;
        let category = db
            .categories()
            .create(NewCategory {
                name: category_name.to_string(),
                description: None,
            })
            .await?;

        let mut lines = Vec::new();
        for (name, price) in items.iter() {
            let product = db
                .products()
                .create(NewProduct {
                    supplier_id: supplier.id.clone(),
                    category_id: Some(category.id.clone()),
                    name: name.to_string(),
                    description: None,
                    image_links: vec![],
                    input_price: price * 4 / 5,
                    output_price: *price,
                })
                .await?;

            lines.push(GoodReceiptItem {
                product_id: product.id.clone(),
                quantity: RECEIVED_QUANTITY,
                input_price: product.input_price,
                date_of_manufacture: Some(today() - Duration::days(days + 7)),
                expiry_date: Some(today() + Duration::days(180)),
                detail_id: None,
            });
            products.push(product);
        }

        let receipt = db
            .good_receipts()
            .create(NewGoodReceipt {
                supplier_id: supplier.id.clone(),
                order_form_id: None,
                receiver_id: admin.id.clone(),
                items: lines,
                note: None,
            })
            .await?;
        println!("✓ {} ({}): {} batches", supplier_name, receipt.code, receipt.items.len());
    }

    // Sales
    println!();
    println!("Generating orders...");
    let mut generated = 0;
    for day in 0..days {
        for n in 0..3 {
            let seed = (day * 3 + n) as usize;
            let items: Vec<OrderItem> = (0..2)
                .map(|k| {
                    let product = &products[(seed + k * 4) % products.len()];
                    OrderItem {
                        product_id: product.id.clone(),
                        quantity: 1 + (seed % 3) as i64,
                        price: product.output_price,
                        batch_details: None,
                    }
                })
                .collect();

            let checkout = db
                .orders()
                .create(
                    NewOrder {
                        employee_id: admin.id.clone(),
                        items,
                        total_amount: None,
                        payment_method: if seed % 2 == 0 {
                            PaymentMethod::Cash
                        } else {
                            PaymentMethod::Transfer
                        },
                        payment_status: true,
                        status: None,
                        note: None,
                    },
                    ShortfallPolicy::Allow,
                )
                .await?;

            if let Err(e) = backdate(&db, &checkout.order.id, days - day).await {
                eprintln!("Failed to backdate {}: {}", checkout.order.order_code, e);
            }
            generated += 1;
        }
    }

    println!("✓ Generated {} paid orders", generated);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Moves an order into the past so revenue reports have history.
async fn backdate(db: &Database, order_id: &str, days_ago: i64) -> Result<(), sqlx::Error> {
    let at = Utc::now() - Duration::days(days_ago);
    sqlx::query("UPDATE orders SET created_at = ?2, updated_at = ?2 WHERE id = ?1")
        .bind(order_id)
        .bind(at)
        .execute(db.pool())
        .await?;
    Ok(())
}
