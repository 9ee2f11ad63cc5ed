//! Splits a schema dump into pre-data DDL and foreign-key constraints.
//!
//! The dump tool brackets every statement with a stylized comment of the
//! form `-- Name: <name>; Type: <type>; Schema: <schema>; Owner: <owner>`.
//! Scanning linewise, sections whose marker carries `Type: FK CONSTRAINT`
//! are routed to the constraint side; everything else stays on the pre-data
//! side. Order within each side is preserved verbatim, because later
//! statements may depend on earlier ones.

use crate::error::SnapshotError;

/// The two halves of a split schema dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitDdl {
    /// Everything needed before data loads: tables, sequences, indexes, ...
    pub pre_data: String,
    /// Deferrable foreign-key constraint statements, applied after data.
    pub fk_constraints: String,
}

const SECTION_MARKER: &str = "-- Name:";
const FK_SECTION: &str = "Type: FK CONSTRAINT";

/// Split `dump` into its two restore phases. An entirely empty dump is an
/// error: it means the external tool produced nothing.
pub fn split_schema_dump(dump: &str) -> Result<SplitDdl, SnapshotError> {
    let mut pre_data = String::new();
    let mut fk_constraints = String::new();
    let mut capturing_fk = false;

    for line in dump.lines() {
        if line.starts_with(SECTION_MARKER) {
            capturing_fk = line.contains(FK_SECTION);
        }
        let side = if capturing_fk {
            &mut fk_constraints
        } else {
            &mut pre_data
        };
        side.push_str(line);
        side.push('\n');
    }

    if pre_data.is_empty() && fk_constraints.is_empty() {
        return Err(SnapshotError::EmptyDump);
    }

    Ok(SplitDdl {
        pre_data,
        fk_constraints,
    })
}
