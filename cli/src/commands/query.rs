use std::sync::Arc;

use caravan_core::{MemoryNavigator, QueryBatch, QuerySync, QueryUpdate};

use crate::args::QueryArgs;

/// Prints the query string committed after merging the batch
pub fn query_cmd(args: QueryArgs) -> anyhow::Result<()> {
    let navigator = Arc::new(MemoryNavigator::with_query(&args.current));
    let sync = QuerySync::new(navigator.clone());

    let mut batch: QueryBatch = args
        .set
        .into_iter()
        .map(|(name, value)| QueryUpdate::set(name, value))
        .collect();
    for name in args.unset {
        batch.push(QueryUpdate::remove(name));
    }

    sync.apply(batch, args.replace);
    println!("{}", navigator.query_string());

    Ok(())
}
