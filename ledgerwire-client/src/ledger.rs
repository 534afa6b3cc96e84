//! Ledger bookkeeping fed by the node's ledger stream
//!
//! The subscribe handshake seeds this state from its `result`; every
//! subsequent `ledgerClosed` frame updates it. The connection consults it to
//! answer ledger-version queries without a network round trip.

use ledgerwire_core::{LedgerCloseInfo, RangeSet, Result};

/// Snapshot of what the connected node knows about the ledger chain
#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    latest: Option<u32>,
    validated: RangeSet,
    fee_base: Option<u64>,
    fee_ref: Option<u64>,
}

impl LedgerState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply a ledger close (or the seed from the subscribe handshake)
    ///
    /// When the frame carries `validated_ledgers` the range set is rebuilt
    /// from it wholesale, since the node's view is authoritative and may
    /// include history the client never saw. Without it only the closed
    /// index itself is marked available.
    pub(crate) fn update(&mut self, info: &LedgerCloseInfo) -> Result<()> {
        self.latest = Some(info.ledger_index);
        match &info.validated_ledgers {
            Some(ranges) => {
                self.validated.reset();
                self.validated.parse_ranges(ranges)?;
            }
            None => self.validated.add_value(info.ledger_index),
        }
        if let Some(fee_base) = info.fee_base {
            self.fee_base = Some(fee_base);
        }
        if let Some(fee_ref) = info.fee_ref {
            self.fee_ref = Some(fee_ref);
        }
        Ok(())
    }

    pub(crate) fn latest(&self) -> Option<u32> {
        self.latest
    }

    pub(crate) fn fee_base(&self) -> Option<u64> {
        self.fee_base
    }

    pub(crate) fn fee_ref(&self) -> Option<u64> {
        self.fee_ref
    }

    pub(crate) fn has_version(&self, version: u32) -> bool {
        self.validated.contains_value(version)
    }

    pub(crate) fn has_versions(&self, low: u32, high: u32) -> bool {
        low <= high && self.validated.contains_range(low, high)
    }

    /// Forget everything learned from the previous session
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
