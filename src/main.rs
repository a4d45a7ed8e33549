// Autonumber - Show the next value a save in a partition would receive

use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use autonumber::{
    autonumber::{AllocationStrategy, SequenceAllocator},
    config::Config,
    infrastructure::SqliteSequenceStore,
};

const USAGE: &str =
    "usage: autonumber <entity_type> <field_name> [auto_grouping] [manual_grouping]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 4 {
        anyhow::bail!(USAGE);
    }
    let (entity_type, field_name) = (&args[0], &args[1]);
    let auto_grouping = args.get(2).map(String::as_str);
    let manual_grouping = args.get(3).map(String::as_str);

    // Load configuration
    let config = Config::from_env()?;

    let store = Arc::new(SqliteSequenceStore::connect(&config.database).await?);
    store.health_check().await?;

    // The counter strategy advances on every call, so only read MAX + 1 here
    let mut peek = config.allocation.clone();
    peek.strategy = AllocationStrategy::MaxPlusOne;
    let allocator = SequenceAllocator::new(store.clone(), &peek);

    let next = allocator
        .next_value(entity_type, field_name, auto_grouping, manual_grouping)
        .await?;

    println!(
        "{}",
        json!({
            "entity_type": entity_type,
            "field_name": field_name,
            "auto_grouping": auto_grouping,
            "manual_grouping": manual_grouping,
            "next_value": next,
            "strategy": config.allocation.strategy,
        })
    );

    store.close().await;
    Ok(())
}
