//! Registration of the built-in lowerers.

use crate::macros::cond::{expand_cond, expand_if, expand_unless, COND, IF, UNLESS};
use crate::macros::concat::{expand_concat, CONCAT};
use crate::macros::delegate::{expand_defdelegate, DEFDELEGATE};
use crate::macros::destructure::{expand_destructure, DESTRUCTURE};
use crate::macros::neutralize::{expand_match_q, MATCH_Q};
use crate::macros::record::{expand_defrecord, expand_record, DEFRECORD, RECORD};
use crate::macros::MacroRegistry;

/// Registers all standard lowerers in the given registry.
///
/// Return values are ignored since the built-in tags never collide.
pub fn register_std_macros(registry: &mut MacroRegistry) {
    // Pattern tests
    registry.register(MATCH_Q, expand_match_q);

    // Control flow
    registry.register(COND, expand_cond);
    registry.register(IF, expand_if);
    registry.register(UNLESS, expand_unless);

    // Binaries and lists
    registry.register(CONCAT, expand_concat);
    registry.register(DESTRUCTURE, expand_destructure);

    // Records and forwarding
    registry.register(DEFRECORD, expand_defrecord);
    registry.register(RECORD, expand_record);
    registry.register(DEFDELEGATE, expand_defdelegate);
}
