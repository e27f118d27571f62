use anyhow::Context;
use clap::{Arg, Command};
use std::io::{self, Write};

const CATEGORIES: &[&str] = &[
    "Cold Beverages",
    "hot beverages",
    "Food Packs",
    "Snacks",
    "Toiletries",
    "Beach Gear",
    "",
];

const PRODUCTS: &[&str] = &[
    "coca cola can",
    "SAN MIGUEL PALE PILSEN",
    "chicken adobo rice meal",
    "instant noodles",
    "Sunblock SPF 50",
    "snorkel set",
    "bottled water 500ml",
    "banana chips",
];

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Write a synthetic inventory CSV to stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("physical-count")
                .long("physical-count")
                .help("Add a `count` column like the stocktake sheet")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dirty-every")
                .long("dirty-every")
                .help("Every Nth row gets a blank price and stock")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .get_matches();

    let rows: u64 = *matches.get_one("rows").context("--rows has a default")?;
    let physical_count = matches.get_flag("physical-count");
    let dirty_every: u64 = *matches.get_one("dirty-every").context("--dirty-every has a default")?;

    let mut out = io::BufWriter::new(io::stdout().lock());

    write!(&mut out, "id,Product Name,Price,Size,Units,Category,Min Level,Stock")?;
    if physical_count {
        write!(&mut out, ",count")?;
    }
    writeln!(&mut out, ",re-stock Price,Supplier,Notes")?;

    // Deterministic: row i always produces the same line.
    for i in 0..rows {
        let id = i + 1;
        let product = PRODUCTS[(i as usize) % PRODUCTS.len()];
        let category = CATEGORIES[(i as usize) % CATEGORIES.len()];
        let dirty = dirty_every > 0 && id % dirty_every == 0;
        let (price, stock) = if dirty {
            (String::new(), String::new())
        } else {
            (format!("{}.{:02}", 20 + i % 180, i % 100), (i % 250).to_string())
        };

        write!(
            &mut out,
            "{id},\"{product} #{id}\",{price},,pcs,\"{category}\",5,{stock}"
        )?;
        if physical_count {
            write!(&mut out, ",{}", (i * 7) % 240)?;
        }
        writeln!(&mut out, ",{}.50,\"Supplier {}\",", 10 + i % 90, i % 12)?;

        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
