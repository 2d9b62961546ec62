/// Router Module Index
///
/// Routes are grouped by the access they require. Authentication is applied as a layer
/// on whole groups in `create_router`; role checks happen in the services.

/// Routes open to guests. Site detail still looks for an optional session.
pub mod public;

/// Routes that require a session (any role).
pub mod authenticated;

/// Routes that require a session and a curator role (GUIDE or ADMIN).
pub mod curator;
