mod coordinator;

pub(crate) use coordinator::{FlightRole, RefreshCoordinator, RefreshOutcome};
