//! Prints a bcrypt hash for `ADMIN_HASH_PASSWORD`.
//!
//! Usage: hash-password <PASSWORD> [COST]

use bcrypt::{hash, DEFAULT_COST};
use std::env;

const MIN_PASSWORD_LENGTH: usize = 8;

fn main() {
    let mut args = env::args().skip(1);
    let password = args.next().unwrap_or_else(|| {
        eprintln!("Usage: hash-password <PASSWORD> [COST]");
        std::process::exit(1);
    });

    let cost = match args.next() {
        None => DEFAULT_COST,
        Some(raw) => match raw.parse::<u32>() {
            Ok(cost) if (4..=31).contains(&cost) => cost,
            _ => {
                eprintln!("COST must be a number between 4 and 31");
                std::process::exit(1);
            }
        },
    };

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        eprintln!(
            "Warning: password is shorter than {} characters; the admin API rejects such passwords.",
            MIN_PASSWORD_LENGTH
        );
    }

    match hash(&password, cost) {
        Ok(hashed) => {
            println!("\nCost     : {}", cost);
            println!("Hash     : {}\n", hashed);
            println!("# Paste this into your .env:");
            println!("ADMIN_HASH_PASSWORD={}", hashed);
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
