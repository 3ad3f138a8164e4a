pub mod ledger;
pub mod price_table;

#[cfg(test)]
pub use ledger::ManualClock;
pub use ledger::{Clock, DedupLedger, MemoryLedger, SystemClock};
pub use price_table::{MarketPriceStore, MemoryPriceTable, PriceEntry, PriceKey};
