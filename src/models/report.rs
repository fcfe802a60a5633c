use std::fmt;

/// What happened to one feed entry during an import run.
///
/// Callers can tell "already seen" apart from "failed to fetch" and
/// "rejected by policy", instead of a single skipped counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Imported(i64),
    DuplicateLink,
    DuplicateImage,
    TooShort,
    NoImage,
    FetchFailed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: u32,
    pub duplicate_link: u32,
    pub duplicate_image: u32,
    pub too_short: u32,
    pub no_image: u32,
    pub fetch_failed: u32,
    pub feed_failed: u32,
}

impl ImportReport {
    pub fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Imported(_) => self.imported += 1,
            EntryOutcome::DuplicateLink => self.duplicate_link += 1,
            EntryOutcome::DuplicateImage => self.duplicate_image += 1,
            EntryOutcome::TooShort => self.too_short += 1,
            EntryOutcome::NoImage => self.no_image += 1,
            EntryOutcome::FetchFailed(_) => self.fetch_failed += 1,
        }
    }

    pub fn merge(&mut self, other: &ImportReport) {
        self.imported += other.imported;
        self.duplicate_link += other.duplicate_link;
        self.duplicate_image += other.duplicate_image;
        self.too_short += other.too_short;
        self.no_image += other.no_image;
        self.fetch_failed += other.fetch_failed;
        self.feed_failed += other.feed_failed;
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} importés, {} doublons (lien), {} doublons (image), {} trop courts, \
             {} sans image, {} échecs de page, {} flux en erreur",
            self.imported,
            self.duplicate_link,
            self.duplicate_image,
            self.too_short,
            self.no_image,
            self.fetch_failed,
            self.feed_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_each_outcome() {
        let mut report = ImportReport::default();
        report.record(&EntryOutcome::Imported(1));
        report.record(&EntryOutcome::Imported(2));
        report.record(&EntryOutcome::DuplicateLink);
        report.record(&EntryOutcome::TooShort);
        report.record(&EntryOutcome::FetchFailed("timeout".into()));
        assert_eq!(report.imported, 2);
        assert_eq!(report.duplicate_link, 1);
        assert_eq!(report.too_short, 1);
        assert_eq!(report.fetch_failed, 1);
        assert_eq!(report.no_image, 0);
    }

    #[test]
    fn merge_sums_counters() {
        let mut a = ImportReport {
            imported: 2,
            feed_failed: 1,
            ..Default::default()
        };
        let b = ImportReport {
            imported: 3,
            duplicate_link: 4,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.imported, 5);
        assert_eq!(a.duplicate_link, 4);
        assert_eq!(a.feed_failed, 1);
    }

    #[test]
    fn display_mentions_imported_count() {
        let report = ImportReport {
            imported: 7,
            ..Default::default()
        };
        assert!(report.to_string().contains("7 importés"));
    }
}
