use std::sync::Arc;

use tracing::{info, warn};

use super::domain::StaffMember;
use super::repository::{DirectoryRepository, RepositoryError};

/// Resolves the approver responsible for a location.
#[derive(Clone)]
pub struct CoverageDirectory {
    directory: Arc<dyn DirectoryRepository>,
}

impl CoverageDirectory {
    pub fn new(directory: Arc<dyn DirectoryRepository>) -> Self {
        Self { directory }
    }

    /// Returns the covering approver, or `None` when nobody covers the
    /// location. Overlapping assignments resolve to the lowest approver id.
    pub fn approver_for(&self, location: &str) -> Result<Option<StaffMember>, RepositoryError> {
        let approver_id = self
            .directory
            .coverage_assignments()?
            .into_iter()
            .filter(|assignment| assignment.covers(location))
            .map(|assignment| assignment.approver_id)
            .min();

        let Some(approver_id) = approver_id else {
            info!(%location, "no coverage assignment for location");
            return Ok(None);
        };

        let approver = self.directory.staff(approver_id)?;
        if approver.is_none() {
            warn!(%location, %approver_id, "coverage references unknown staff member");
        }
        Ok(approver)
    }
}
