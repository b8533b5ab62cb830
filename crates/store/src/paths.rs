use std::path::{Path, PathBuf};

pub const STATE_DIR_NAME: &str = ".svc-facts";
pub const DATA_DIR_NAME: &str = "data";
pub const REPORTS_DIR_NAME: &str = "reports";

pub const CONTACTS_FILE_NAME: &str = "contacts.json";
pub const SUMMARY_FILE_NAME: &str = "monthly_summary.json";
pub const LOCK_FILE_NAME: &str = "store.lock";

#[must_use]
pub fn default_data_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR_NAME).join(DATA_DIR_NAME)
}

#[must_use]
pub fn default_reports_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR_NAME).join(REPORTS_DIR_NAME)
}

#[must_use]
pub fn contacts_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONTACTS_FILE_NAME)
}

#[must_use]
pub fn summary_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SUMMARY_FILE_NAME)
}

#[must_use]
pub fn lock_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOCK_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_under_state_dir() {
        let root = Path::new("/srv/app");
        let data = default_data_dir(root);
        assert_eq!(data, PathBuf::from("/srv/app/.svc-facts/data"));
        assert_eq!(
            contacts_path(&data),
            PathBuf::from("/srv/app/.svc-facts/data/contacts.json")
        );
        assert_eq!(
            summary_path(&data),
            PathBuf::from("/srv/app/.svc-facts/data/monthly_summary.json")
        );
        assert_eq!(
            default_reports_dir(root),
            PathBuf::from("/srv/app/.svc-facts/reports")
        );
    }
}
