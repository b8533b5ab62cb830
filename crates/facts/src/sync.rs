use crate::catalog::Catalog;
use crate::types::{FlagRow, ProvidedService, Side};

/// Derive the flag representation from a contact's service lists.
///
/// Every catalog entry ends up with exactly one requested and one provided flag. Names the
/// catalog does not know are skipped here; the auditor is responsible for surfacing them.
/// Provider and completion metadata never influence the flags.
#[must_use]
pub fn synchronize<S: AsRef<str>>(
    catalog: &Catalog,
    requested: &[S],
    provided: &[ProvidedService],
) -> FlagRow {
    let mut row = FlagRow::zeroed();

    for name in requested {
        match catalog.resolve(name.as_ref()) {
            Some(entry) => row.set(entry.code, Side::Requested, true),
            None => log::debug!("skipping unknown requested service {:?}", name.as_ref()),
        }
    }

    for item in provided {
        match catalog.resolve(&item.service) {
            Some(entry) => row.set(entry.code, Side::Provided, true),
            None => log::debug!("skipping unknown provided service {:?}", item.service),
        }
    }

    row
}

/// Stateful wrapper binding a catalog, used by contact write paths
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    catalog: Catalog,
}

impl Synchronizer {
    #[must_use]
    pub const fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn flags_for(&self, facts: &crate::ContactFacts) -> FlagRow {
        synchronize(&self.catalog, &facts.requested, &facts.provided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceCode;
    use crate::types::FlagPair;
    use pretty_assertions::assert_eq;

    const NONE: [&str; 0] = [];

    #[test]
    fn requested_food_sets_only_food_requested() {
        let catalog = Catalog::standard();
        let row = synchronize(&catalog, &["Food"], &[]);
        for code in ServiceCode::ALL {
            let expected = FlagPair {
                requested: code == ServiceCode::Food,
                provided: false,
            };
            assert_eq!(row.get(code), expected, "{code}");
        }
        assert_eq!(row.column("food_requested"), Some(1));
        assert_eq!(row.column("food_provided"), Some(0));
    }

    #[test]
    fn duplicates_collapse() {
        let catalog = Catalog::standard();
        assert_eq!(
            synchronize(&catalog, &["Food", "Food"], &[]),
            synchronize(&catalog, &["Food"], &[])
        );
    }

    #[test]
    fn provided_metadata_is_ignored() {
        let catalog = Catalog::standard();
        let bare = synchronize(&catalog, &NONE, &[ProvidedService::new("Housing")]);
        let rich = synchronize(
            &catalog,
            &NONE,
            &[
                ProvidedService::new("Housing").provider("Ana"),
                ProvidedService::new("Housing").provider("Ben"),
            ],
        );
        assert_eq!(bare, rich);
        assert!(rich.flag(ServiceCode::Housing, Side::Provided));
        assert!(!rich.flag(ServiceCode::Housing, Side::Requested));
    }

    #[test]
    fn unknown_names_are_skipped() {
        let catalog = Catalog::standard();
        let row = synchronize(
            &catalog,
            &["Meal", "Laundry", "occupational therapy"],
            &[ProvidedService::new("Shower")],
        );
        assert_eq!(row, FlagRow::zeroed());
    }

    #[test]
    fn aliases_set_the_canonical_flags() {
        let catalog = Catalog::standard();
        let row = synchronize(
            &catalog,
            &["Occupational"],
            &[ProvidedService::new("Occupational").provider("Ana")],
        );
        assert!(row.flag(ServiceCode::OccupationalTherapy, Side::Requested));
        assert!(row.flag(ServiceCode::OccupationalTherapy, Side::Provided));
        assert_eq!(
            row,
            synchronize(
                &catalog,
                &["Occupational Therapy"],
                &[ProvidedService::new("occupational_therapy")],
            )
        );
    }

    #[test]
    fn codes_are_accepted_as_names() {
        let catalog = Catalog::standard();
        assert_eq!(
            synchronize(&catalog, &["mental_health"], &[]),
            synchronize(&catalog, &["Mental Health"], &[])
        );
    }

    #[test]
    fn retraction_clears_a_previously_set_flag() {
        let sync = Synchronizer::default();
        let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let before = crate::ContactFacts::new(date)
            .request("Food")
            .request("Legal");
        let after = crate::ContactFacts::new(date).request("Legal");

        let changes = sync.flags_for(&before).diff(&sync.flags_for(&after));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].column, "food_requested");
        assert_eq!((changes[0].before, changes[0].after), (1, 0));
    }
}
