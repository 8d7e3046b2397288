use switchyard_contract::ContractError;
use switchyard_ledger::LedgerError;
use thiserror::Error;

/// Hard faults the engine cannot turn into a report. Agent failures are not
/// here; those become an `ERROR` outcome with the fault recorded.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("ledger failure during dispatch: {0}")]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}
