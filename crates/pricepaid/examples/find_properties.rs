//! Postcode property search
//!
//! Reads backend settings from `PRICEPAID_*` environment variables and prints
//! the first page of transactions near a postcode.
//!
//! ```text
//! cargo run --example find_properties -- "SW1A 1AA" 1 0
//! ```

use pricepaid::{PropertySearchRequest, PropertySearchResponse, PropertySearcher, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pricepaid::init_logging(tracing::Level::INFO)?;

    let mut args = std::env::args().skip(1);
    let postcode = args.next().unwrap_or_else(|| "SW1A 1AA".to_string());
    let distance_km = args.next().map(|a| a.parse::<u32>()).transpose()?.unwrap_or(1);
    let page = args.next().map(|a| a.parse::<u32>()).transpose()?.unwrap_or(0);

    let searcher = PropertySearcher::from_config(&ServiceConfig::from_env()?)?;
    let request = PropertySearchRequest::new(postcode, distance_km, page);

    println!(
        "Searching within {}km of '{}' (page {}):",
        request.distance_km, request.postcode, request.page
    );
    let response = searcher.find_properties(&request).await?;
    print_response(&response, 10);

    Ok(())
}

fn print_response(response: &PropertySearchResponse, limit: usize) {
    if response.is_empty() {
        println!("  No transactions found");
        return;
    }

    for (i, result) in response.results.iter().take(limit).enumerate() {
        let address = &result.address;
        println!(
            "  {}. {} {}, {} - £{} ({}, {}, {})",
            i + 1,
            address.building,
            address.street.as_deref().unwrap_or(""),
            address.postcode.as_deref().unwrap_or("Unknown"),
            result.price.unwrap_or_default(),
            result.classification.property_type,
            result.classification.build_status,
            result.classification.tenure,
        );
    }
    if response.results.len() > limit {
        println!("  ... and {} more results", response.results.len() - limit);
    }

    println!("\n  Towns:");
    for town in &response.facets.towns {
        println!("    {} ({})", town.label, town.count);
    }
    println!("  Prices:");
    for price in &response.facets.prices {
        println!("    {} ({})", price.label, price.count);
    }
}
