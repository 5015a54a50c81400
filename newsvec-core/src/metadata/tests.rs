#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crate::core::errors::NewsvecError;
    use crate::core::types::ExternalId;
    use crate::metadata::filter::{Field, FilterBuilder, FilterOp, TextField};
    use crate::metadata::schema::{Location, MetadataRecord};
    use crate::metadata::store::{InMemoryMetadataStore, MetadataStore};

    fn article() -> MetadataRecord {
        let mut berlin = Location::new("Berlin");
        berlin.nuts = Some("DE300".to_string());
        let mut record = MetadataRecord::new("cc-news", "Der Senat beschließt den Haushalt.")
            .with_title("Haushalt 2024")
            .with_url("https://www.tagesspiegel.de/berlin/haushalt")
            .with_published(NaiveDate::from_ymd_opt(2024, 2, 14).unwrap())
            .with_location(berlin);
        record.tags = vec!["politik".to_string()];
        record.normalize();
        record
    }

    #[test]
    fn test_store_put_get_delete() {
        let mut store = InMemoryMetadataStore::new();
        let id = ExternalId::new("doc1");
        assert!(matches!(store.get(&id), Err(NewsvecError::NotFound(_))));

        assert!(store.put(id.clone(), article()).is_none());
        assert_eq!(store.get(&id).unwrap().source, "cc-news");

        let updated = MetadataRecord::new("cc-news", "updated");
        assert!(store.put(id.clone(), updated).is_some());
        assert_eq!(store.get(&id).unwrap().text, "updated");
        assert_eq!(store.len(), 1);

        assert!(store.delete(&id).is_some());
        assert!(store.delete(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_restore_from_entries() {
        let mut store = InMemoryMetadataStore::new();
        store.put(ExternalId::new("b"), article());
        store.put(ExternalId::new("a"), article());
        let entries = store.entries();
        assert_eq!(entries[0].id.as_str(), "a");

        let restored = InMemoryMetadataStore::restore(entries.clone());
        assert_eq!(restored.entries(), entries);
    }

    #[test]
    fn test_equals_filters() {
        let record = article();
        assert!(FilterOp::Equals(Field::Source, "cc-news".into()).matches(&record));
        assert!(FilterOp::Equals(Field::Hostname, "www.tagesspiegel.de".into()).matches(&record));
        assert!(FilterOp::Equals(Field::Tld, "de".into()).matches(&record));
        assert!(FilterOp::Equals(Field::Tag, "politik".into()).matches(&record));
        assert!(!FilterOp::Equals(Field::Tld, "com".into()).matches(&record));
        assert!(!FilterOp::Equals(Field::Category, "sport".into()).matches(&record));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let record = article();
        assert!(FilterOp::Contains(TextField::Text, "SENAT".into()).matches(&record));
        assert!(FilterOp::Contains(TextField::Title, "haushalt".into()).matches(&record));
        assert!(!FilterOp::Contains(TextField::Title, "wahl".into()).matches(&record));
    }

    #[test]
    fn test_location_filters() {
        let record = article();
        assert!(FilterOp::Location("BERLIN".into()).matches(&record));
        assert!(FilterOp::NutsPrefix("DE3".into()).matches(&record));
        assert!(!FilterOp::NutsPrefix("DE2".into()).matches(&record));
    }

    #[test]
    fn test_published_range() {
        let record = article();
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day);
        assert!(FilterOp::Published(d(2, 1), d(2, 28)).matches(&record));
        assert!(FilterOp::Published(d(2, 14), d(2, 14)).matches(&record));
        assert!(FilterOp::Published(None, d(2, 14)).matches(&record));
        assert!(!FilterOp::Published(d(3, 1), None).matches(&record));
        assert!(!FilterOp::Published(None, None).matches(&MetadataRecord::new("s", "t")));
    }

    #[test]
    fn test_filter_builder_conjunction() {
        let filter = FilterBuilder::new()
            .equals(Field::Tld, "de")
            .location("berlin")
            .custom(|r| r.text.len() > 10)
            .build();
        assert!(filter.matches(&article()));

        let filter = FilterBuilder::new()
            .equals(Field::Tld, "de")
            .contains(TextField::Text, "fußball")
            .build();
        assert!(!filter.matches(&article()));
        assert!(FilterBuilder::new().build().matches(&article()));
    }

    #[test]
    fn test_parse_filter_conditions() {
        let record = article();
        for expr in [
            "source=cc-news",
            "tld=de",
            "text~senat",
            "location=Berlin",
            "nuts^=DE",
            "published=2024-01-01..2024-12-31",
            "published=..2024-02-14",
        ] {
            let op: FilterOp = expr.parse().unwrap();
            assert!(op.matches(&record), "{}", expr);
        }
        assert!("colour=red".parse::<FilterOp>().is_err());
        assert!("published=yesterday".parse::<FilterOp>().is_err());
        assert!("tld".parse::<FilterOp>().is_err());
    }

    #[test]
    fn test_parse_splits_on_first_operator() {
        match "source=a~b".parse::<FilterOp>().unwrap() {
            FilterOp::Equals(Field::Source, value) => assert_eq!(value, "a~b"),
            other => panic!("unexpected {:?}", other),
        }
        match "title~x=y".parse::<FilterOp>().unwrap() {
            FilterOp::Contains(TextField::Title, value) => assert_eq!(value, "x=y"),
            other => panic!("unexpected {:?}", other),
        }
        match "hostname=a^=b".parse::<FilterOp>().unwrap() {
            FilterOp::Equals(Field::Hostname, value) => assert_eq!(value, "a^=b"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
