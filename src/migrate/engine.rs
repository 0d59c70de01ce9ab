//! Migration engine
//!
//! The `Migrator` resolves source activities against the target store and,
//! on request, recreates missing ones together with every activity they
//! depend on. All store access goes through the three handles it was built
//! with; nothing is selected globally.

use uuid::Uuid;

use crate::exchange::{Exchange, ExchangeKind};
use crate::fuzzy::{FuzzyMatcher, Scored, Scorer, TokenSortRatio};
use crate::key::RecordKey;
use crate::record::Record;
use crate::storage::RecordStore;
use crate::{Error, Result};

use super::biosphere::BiosphereQuery;
use super::cache::MigrationCache;
use super::collector::{ExchangeCollector, ExchangeDetails};
use super::resolution::{MatchStrategy, MigratedRef, Resolution};
use super::stats::MigrationStats;
use super::{MigratorSettings, ResolveOptions};

/// Source keys currently being created, outermost first
#[derive(Debug, Default)]
struct CreationPath {
    keys: Vec<RecordKey>,
}

impl CreationPath {
    fn enter(&mut self, key: &RecordKey) -> Result<()> {
        if self.keys.contains(key) {
            let cycle = self
                .keys
                .iter()
                .chain(std::iter::once(key))
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::CyclicGraph { cycle });
        }
        self.keys.push(key.clone());
        Ok(())
    }

    fn leave(&mut self) {
        self.keys.pop();
    }

    fn depth(&self) -> usize {
        self.keys.len()
    }
}

/// Resolves and creates activities from a source store in a target store
pub struct Migrator<'s, S = TokenSortRatio> {
    source: &'s dyn RecordStore,
    target: &'s dyn RecordStore,
    biosphere: &'s dyn RecordStore,
    matcher: FuzzyMatcher<S>,
    settings: MigratorSettings,
    collector: ExchangeCollector,
    cache: MigrationCache,
    path: CreationPath,
    stats: MigrationStats,
}

impl<'s> Migrator<'s, TokenSortRatio> {
    /// Create a migrator with default settings
    pub fn new(
        source: &'s dyn RecordStore,
        target: &'s dyn RecordStore,
        biosphere: &'s dyn RecordStore,
    ) -> Self {
        Self::with_settings(source, target, biosphere, MigratorSettings::default())
    }

    pub fn with_settings(
        source: &'s dyn RecordStore,
        target: &'s dyn RecordStore,
        biosphere: &'s dyn RecordStore,
        settings: MigratorSettings,
    ) -> Self {
        Self::with_scorer(source, target, biosphere, settings, TokenSortRatio)
    }
}

impl<'s, S: Scorer> Migrator<'s, S> {
    /// Create a migrator with a custom similarity scorer
    pub fn with_scorer(
        source: &'s dyn RecordStore,
        target: &'s dyn RecordStore,
        biosphere: &'s dyn RecordStore,
        settings: MigratorSettings,
        scorer: S,
    ) -> Self {
        Self {
            source,
            target,
            biosphere,
            matcher: FuzzyMatcher::with_scorer(scorer),
            settings,
            collector: ExchangeCollector::new(settings.duplicates),
            cache: MigrationCache::new(),
            path: CreationPath::default(),
            stats: MigrationStats::default(),
        }
    }

    pub fn settings(&self) -> &MigratorSettings {
        &self.settings
    }

    pub fn stats(&self) -> &MigrationStats {
        &self.stats
    }

    pub fn cache(&self) -> &MigrationCache {
        &self.cache
    }

    /// Resolve a source activity in the target store.
    ///
    /// `id` is a code of the source store, or a full key with `by_key`.
    /// Results are memoized per source key; a repeated call returns the
    /// same resolution without touching any store.
    pub fn resolve(&mut self, id: &str, opts: &ResolveOptions) -> Result<Resolution> {
        let key = self.source_key(id, opts.by_key)?;
        self.resolve_key(&key, opts)
    }

    /// `resolve`, projected to the requested shape
    pub fn migrate(&mut self, id: &str, opts: &ResolveOptions) -> Result<(MigratedRef, bool)> {
        Ok(self.resolve(id, opts)?.to_pair(opts.shape))
    }

    /// Create a copy of a source activity in the target store without
    /// looking for an existing match first.
    ///
    /// Inputs of the activity are still resolved (and created when missing)
    /// with the fuzzy settings of `opts`. A source activity is created at
    /// most once per migrator.
    ///
    /// Records are written one by one as the supply chain is walked, so a
    /// failure part way leaves the records written so far behind. Run this
    /// (and `resolve` with `create_if_not_found`) inside
    /// `SqliteStore::in_transaction` and drop the migrator after a rollback,
    /// since its cache still refers to the discarded records.
    pub fn create_if_not_found(&mut self, id: &str, opts: &ResolveOptions) -> Result<Resolution> {
        let key = self.source_key(id, opts.by_key)?;
        self.create_for_key(&key, opts)
    }

    /// Find the target biosphere flow for a biosphere exchange
    pub fn resolve_biosphere(&mut self, details: &ExchangeDetails) -> Result<Resolution> {
        let query = BiosphereQuery::from_details(details);
        if let Some(cached) = self.cache.biosphere(&query) {
            self.stats.cache_hits += 1;
            return Ok(cached.clone());
        }

        let biosphere = self.biosphere;
        let flows = self.scan(biosphere)?;

        let exact: Vec<&Record> = flows.iter().filter(|flow| query.matches(flow)).collect();
        let resolution = match self.pick(&exact, "biosphere") {
            Some(flow) => {
                tracing::debug!("Biosphere exact match for '{}': {}", query.name, flow.key);
                self.stats.biosphere_exact += 1;
                Resolution::found(flow.clone(), MatchStrategy::BiosphereExact)
            }
            None => {
                let scored = self.matcher.extract(
                    &query.fuzzy_text(),
                    self.ranked(&flows).into_iter().map(|flow| (flow.biosphere_text(), flow)),
                    self.settings.biosphere_cutoff,
                    self.settings.biosphere_limit,
                );
                let Some((flow, score)) = self.best(scored, "biosphere") else {
                    return Err(Error::BiosphereNotFound {
                        store: biosphere.name().to_string(),
                        name: query.name,
                        categories: query.categories,
                    });
                };
                tracing::debug!("Biosphere fuzzy match for '{}': {} (score {})", query.name, flow.key, score);
                self.stats.biosphere_fuzzy += 1;
                Resolution::found(flow.clone(), MatchStrategy::BiosphereFuzzy { score })
            }
        };

        Ok(self.cache.insert_biosphere(query, resolution).clone())
    }

    fn source_key(&self, id: &str, by_key: bool) -> Result<RecordKey> {
        if by_key {
            RecordKey::parse(id)
        } else {
            Ok(self.source.key_for(id))
        }
    }

    fn resolve_key(&mut self, key: &RecordKey, opts: &ResolveOptions) -> Result<Resolution> {
        if let Some(cached) = self.cache.get(key) {
            tracing::debug!("Cache hit for {}", key);
            self.stats.cache_hits += 1;
            return Ok(cached.clone());
        }

        let source = self.source.get_by_key(key)?.ok_or_else(|| Error::not_found(key))?;

        let resolution = match self.find_match(&source, opts)? {
            Some(found) => found,
            None if opts.create_if_not_found => self.create_for_key(key, opts)?,
            None => {
                tracing::debug!("No match for {} ({})", key, source.short_description());
                self.stats.not_found += 1;
                Resolution::not_found(source)
            }
        };

        Ok(self.cache.insert(key.clone(), resolution).clone())
    }

    /// Exact match, then fuzzy match when enabled
    fn find_match(&mut self, source: &Record, opts: &ResolveOptions) -> Result<Option<Resolution>> {
        let target = self.target;
        let candidates = self.scan(target)?;

        let match_key = source.match_key();
        let exact: Vec<&Record> = candidates.iter().filter(|r| match_key.matches(r)).collect();
        if let Some(hit) = self.pick(&exact, "exact") {
            tracing::debug!("Exact match for {}: {}", source.key, hit.key);
            self.stats.exact += 1;
            return Ok(Some(Resolution::found(hit.clone(), MatchStrategy::Exact)));
        }

        if !opts.fuzzy_match {
            return Ok(None);
        }

        let scored = self.matcher.extract(
            &source.fuzzy_text(),
            self.ranked(&candidates).into_iter().map(|r| (r.fuzzy_text(), r)),
            opts.fuzzy_cutoff,
            self.settings.fuzzy_limit,
        );
        match self.best(scored, "fuzzy") {
            Some((hit, score)) => {
                tracing::debug!("Fuzzy match for {}: {} (score {})", source.key, hit.key, score);
                self.stats.fuzzy += 1;
                Ok(Some(Resolution::found(hit.clone(), MatchStrategy::Fuzzy { score })))
            }
            None => Ok(None),
        }
    }

    /// Create the target copy of a source key, at most once
    fn create_for_key(&mut self, key: &RecordKey, opts: &ResolveOptions) -> Result<Resolution> {
        if let Some(created) = self.cache.created(key) {
            return Ok(created.clone());
        }

        self.path.enter(key)?;
        let result = self.create_from(key, opts);
        self.path.leave();

        Ok(self.cache.record_created(key.clone(), result?).clone())
    }

    fn create_from(&mut self, key: &RecordKey, opts: &ResolveOptions) -> Result<Resolution> {
        let source = self.source.get_by_key(key)?.ok_or_else(|| Error::not_found(key))?;

        let collected = self.collector.collect(self.source, &source)?;
        if collected.truncated {
            self.stats.truncated += 1;
        }
        self.stats.skipped_duplicates += collected.skipped;

        let code = Uuid::new_v4().simple().to_string();
        let record = Record {
            key: self.target.key_for(&code),
            name: source.name.clone(),
            location: source.location.clone(),
            unit: source.unit.clone(),
            reference_product: source.reference_product.clone(),
            categories: None,
            auto_generated: true,
        };

        // persisted before its exchanges so that loops back to it match exactly
        self.target.create_record(&record)?;
        self.stats.created_records += 1;
        // loops back to this key resolve to the record in progress
        self.cache
            .insert(key.clone(), Resolution::found(record.clone(), MatchStrategy::Created));
        tracing::info!(
            "Created {} for {} ({}), depth {}",
            record.key,
            key,
            source.short_description(),
            self.path.depth()
        );

        self.target
            .create_exchange(&Exchange::production(record.key.clone(), record.unit.clone()))?;
        self.stats.created_exchanges += 1;

        for details in collected.exchanges {
            let input = match details.kind {
                ExchangeKind::Production => continue,
                ExchangeKind::Biosphere => self.resolve_biosphere(&details)?.key().clone(),
                ExchangeKind::Technosphere => self.resolve_input(&details.input, opts)?,
            };

            let mut exchange = Exchange::new(record.key.clone(), input, details.amount, details.kind)
                .with_uncertainty(details.uncertainty);
            exchange.unit = details.unit;

            self.target.create_exchange(&exchange)?;
            self.stats.created_exchanges += 1;
        }

        Ok(Resolution::found(record, MatchStrategy::Created))
    }

    /// Target key for a technosphere input, created when missing
    fn resolve_input(&mut self, input: &RecordKey, opts: &ResolveOptions) -> Result<RecordKey> {
        let nested = ResolveOptions {
            by_key: true,
            create_if_not_found: true,
            ..*opts
        };

        let resolution = self.resolve_key(input, &nested)?;
        if resolution.is_found() {
            return Ok(resolution.key().clone());
        }

        // cached as not found by an earlier call without creation
        Ok(self.create_for_key(input, &nested)?.key().clone())
    }

    fn scan(&mut self, store: &dyn RecordStore) -> Result<Vec<Record>> {
        self.stats.scans += 1;
        store.iter_all()
    }

    /// Candidates in tie-break order, so that truncating a ranking never
    /// drops the preferred one of several equal scores
    fn ranked<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        let mut ranked: Vec<&Record> = records.iter().collect();
        self.settings.tie_break.arrange(&mut ranked);
        ranked
    }

    /// Apply the tie-break policy to equally good candidates
    fn pick<'a>(&mut self, candidates: &[&'a Record], tier: &str) -> Option<&'a Record> {
        if candidates.len() > 1 {
            self.stats.ties += 1;
            tracing::warn!(
                "{} equally good {} candidates, picking by {:?}",
                candidates.len(),
                tier,
                self.settings.tie_break
            );
        }
        self.settings.tie_break.pick(candidates.iter().copied())
    }

    /// Best fuzzy candidate; equal top scores go through the tie-break
    fn best<'a>(&mut self, scored: Vec<Scored<&'a Record>>, tier: &str) -> Option<(&'a Record, u8)> {
        let top = scored.first()?.score;
        let tied: Vec<&Record> = scored
            .iter()
            .take_while(|s| s.score == top)
            .map(|s| s.item)
            .collect();
        self.pick(&tied, tier).map(|record| (record, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::exchange::Uncertainty;
    use crate::migrate::{DuplicatePolicy, Shape, TieBreak};
    use crate::storage::{SqliteStore, StoreHandle};

    struct Stores<'a> {
        old: StoreHandle<'a>,
        old_bio: StoreHandle<'a>,
        new: StoreHandle<'a>,
        new_bio: StoreHandle<'a>,
    }

    fn stores(backend: &SqliteStore) -> Stores<'_> {
        Stores {
            old: StoreHandle::new(backend, "old", "ei"),
            old_bio: StoreHandle::new(backend, "old", "biosphere3"),
            new: StoreHandle::new(backend, "new", "ei"),
            new_bio: StoreHandle::new(backend, "new", "biosphere3"),
        }
    }

    fn activity(store: &StoreHandle<'_>, code: &str, name: &str, product: &str) -> Record {
        let record = Record::new(store.key_for(code), name)
            .with_location("RoW")
            .with_unit("kg")
            .with_reference_product(product);
        store.create_record(&record).unwrap();
        record
    }

    fn flow(store: &StoreHandle<'_>, code: &str, name: &str, categories: &[&str]) -> Record {
        let record = Record::new(store.key_for(code), name)
            .with_unit("kilogram")
            .with_categories(categories.iter().copied());
        store.create_record(&record).unwrap();
        record
    }

    fn link(store: &StoreHandle<'_>, from: &Record, to: &Record, amount: f64, kind: ExchangeKind) {
        let unit = if kind == ExchangeKind::Biosphere { "kilogram" } else { "kg" };
        store
            .create_exchange(&Exchange::new(from.key.clone(), to.key.clone(), amount, kind).with_unit(unit))
            .unwrap();
    }

    fn co2_details() -> ExchangeDetails {
        ExchangeDetails {
            input: RecordKey::new("old", "biosphere3", "old-co2"),
            amount: 2.5,
            unit: Some("kilogram".to_string()),
            kind: ExchangeKind::Biosphere,
            uncertainty: Uncertainty::default(),
            name: "Carbon dioxide, fossil".to_string(),
            categories: Some(vec!["air".to_string()]),
        }
    }

    /// Counts every read that reaches the wrapped store
    struct Counting<'a> {
        inner: &'a dyn RecordStore,
        reads: Cell<usize>,
    }

    impl<'a> Counting<'a> {
        fn new(inner: &'a dyn RecordStore) -> Self {
            Self { inner, reads: Cell::new(0) }
        }

        fn bump(&self) {
            self.reads.set(self.reads.get() + 1);
        }
    }

    impl RecordStore for Counting<'_> {
        fn project(&self) -> &str {
            self.inner.project()
        }
        fn name(&self) -> &str {
            self.inner.name()
        }
        fn get_by_code(&self, code: &str) -> Result<Option<Record>> {
            self.bump();
            self.inner.get_by_code(code)
        }
        fn get_by_key(&self, key: &RecordKey) -> Result<Option<Record>> {
            self.bump();
            self.inner.get_by_key(key)
        }
        fn iter_all(&self) -> Result<Vec<Record>> {
            self.bump();
            self.inner.iter_all()
        }
        fn exchanges_of(&self, key: &RecordKey) -> Result<Vec<Exchange>> {
            self.bump();
            self.inner.exchanges_of(key)
        }
        fn create_record(&self, record: &Record) -> Result<()> {
            self.inner.create_record(record)
        }
        fn create_exchange(&self, exchange: &Exchange) -> Result<()> {
            self.inner.create_exchange(exchange)
        }
    }

    #[test]
    fn test_exact_match() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        activity(&s.old, "a", "steel production", "steel");
        let target = activity(&s.new, "a2", "steel production", "steel");

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator.resolve("a", &ResolveOptions::default()).unwrap();

        assert!(res.is_found());
        assert_eq!(res.key(), &target.key);
        assert_eq!(res.strategy(), MatchStrategy::Exact);
    }

    #[test]
    fn test_second_resolve_hits_cache_without_store_access() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        activity(&s.old, "a", "steel production", "steel");
        activity(&s.new, "a2", "steel production", "steel");

        let source = Counting::new(&s.old);
        let target = Counting::new(&s.new);
        let mut migrator = Migrator::new(&source, &target, &s.new_bio);
        let opts = ResolveOptions::default().fuzzy(85);

        let first = migrator.resolve("a", &opts).unwrap();
        let reads = source.reads.get() + target.reads.get();
        assert!(reads > 0);

        let second = migrator.resolve("a", &opts).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.strategy(), second.strategy());
        assert_eq!(source.reads.get() + target.reads.get(), reads);
        assert_eq!(migrator.stats().scans, 1);
        assert_eq!(migrator.stats().cache_hits, 1);
    }

    #[test]
    fn test_not_found_sentinel_is_source_and_cached() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        let source = activity(&s.old, "a", "steel production", "steel");

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let (reference, found) = migrator
            .migrate("a", &ResolveOptions::default().shape(Shape::Code))
            .unwrap();

        assert!(!found);
        assert_eq!(reference, MigratedRef::Code("a".to_string()));
        assert_eq!(migrator.cache().get(&source.key).unwrap().record(), &source);
        assert_eq!(migrator.stats().not_found, 1);
        assert!(s.new.iter_all().unwrap().is_empty());
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let err = migrator.resolve("ghost", &ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref code, .. } if code == "ghost"));

        let err = migrator
            .resolve("lca://old/ei#ghost", &ResolveOptions::default().by_key())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_exact_match_suppresses_fuzzy() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        activity(&s.old, "a", "steel production", "steel");
        activity(&s.new, "near", "steel production, low-alloyed", "steel");
        let exact = activity(&s.new, "exact", "steel production", "steel");

        let scorer = |_: &str, _: &str| -> u8 { panic!("fuzzy scorer invoked") };
        let mut migrator =
            Migrator::with_scorer(&s.old, &s.new, &s.new_bio, MigratorSettings::default(), scorer);

        let res = migrator.resolve("a", &ResolveOptions::default().fuzzy(50)).unwrap();
        assert_eq!(res.key(), &exact.key);
        assert_eq!(migrator.stats().fuzzy, 0);
    }

    #[test]
    fn test_fuzzy_match_without_creation() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        activity(&s.old, "A", "iron (III) chloride production", "iron chloride");
        let candidate = activity(&s.new, "A'", "iron(III) chloride production", "iron chloride");
        activity(&s.new, "other", "market for electricity, low voltage", "electricity");

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let opts = ResolveOptions::default().fuzzy(85).create_if_not_found();
        let (reference, found) = migrator.migrate("A", &opts).unwrap();

        assert!(found);
        assert_eq!(reference, MigratedRef::Key(candidate.key.clone()));
        assert!(matches!(
            migrator.cache().get(&s.old.key_for("A")).unwrap().strategy(),
            MatchStrategy::Fuzzy { score } if score >= 85
        ));
        assert_eq!(s.new.iter_all().unwrap().len(), 2);
        assert_eq!(migrator.stats().created_records, 0);
    }

    #[test]
    fn test_fuzzy_disabled_by_default() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        activity(&s.old, "A", "iron (III) chloride production", "iron chloride");
        activity(&s.new, "A'", "iron(III) chloride production", "iron chloride");

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator.resolve("A", &ResolveOptions::default()).unwrap();
        assert!(!res.is_found());
    }

    #[test]
    fn test_exact_tie_break() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        activity(&s.old, "a", "steel production", "steel");
        activity(&s.new, "zz", "steel production", "steel");
        activity(&s.new, "aa", "steel production", "steel");

        let mut smallest = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = smallest.resolve("a", &ResolveOptions::default()).unwrap();
        assert_eq!(res.code(), "aa");
        assert_eq!(smallest.stats().ties, 1);

        let settings = MigratorSettings {
            tie_break: TieBreak::StoreOrder,
            ..MigratorSettings::default()
        };
        let mut in_order = Migrator::with_settings(&s.old, &s.new, &s.new_bio, settings);
        let res = in_order.resolve("a", &ResolveOptions::default()).unwrap();
        assert_eq!(res.code(), "zz");
    }

    #[test]
    fn test_creation_copies_exchanges() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let b = activity(&s.old, "B", "aluminium casting", "aluminium");
        let c = activity(&s.old, "C", "electricity production", "electricity");
        let co2 = flow(&s.old_bio, "old-co2", "Carbon dioxide, fossil", &["air"]);
        link(&s.old, &b, &b, 1.0, ExchangeKind::Production);
        link(&s.old, &b, &c, 3.0, ExchangeKind::Technosphere);
        link(&s.old, &b, &co2, 0.2, ExchangeKind::Biosphere);

        let c2 = activity(&s.new, "C2", "electricity production", "electricity");
        let co2_new = flow(&s.new_bio, "new-co2", "Carbon dioxide, fossil", &["air"]);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator.create_if_not_found("B", &ResolveOptions::default()).unwrap();

        assert!(res.is_found());
        assert_eq!(res.strategy(), MatchStrategy::Created);
        assert!(res.record().auto_generated);
        assert_eq!(res.record().name, "aluminium casting");
        assert_eq!(res.record().reference_product.as_deref(), Some("aluminium"));
        assert_eq!(res.code().len(), 32);
        assert_eq!(s.new.iter_all().unwrap().len(), 2);

        let exchanges = s.new.exchanges_of(res.key()).unwrap();
        assert_eq!(exchanges.len(), 3);

        let production: Vec<_> = exchanges.iter().filter(|e| e.is_production()).collect();
        assert_eq!(production.len(), 1);
        assert_eq!(production[0].input, *res.key());
        assert_eq!(production[0].amount, 1.0);
        assert_eq!(production[0].unit.as_deref(), Some("kg"));

        assert_eq!(exchanges[1].input, c2.key);
        assert_eq!(exchanges[1].amount, 3.0);
        assert_eq!(exchanges[2].input, co2_new.key);
        assert_eq!(exchanges[2].kind, ExchangeKind::Biosphere);
        assert_eq!(migrator.stats().biosphere_exact, 1);
    }

    /// Two technosphere inputs and one biosphere flow are three copied
    /// exchanges, so the new record ends up with four including production.
    #[test]
    fn test_creation_copies_two_inputs_and_a_flow_into_four_exchanges() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let b = activity(&s.old, "B", "aluminium casting", "aluminium");
        let c = activity(&s.old, "C", "electricity production", "electricity");
        let d = activity(&s.old, "D", "aluminium ingot production", "aluminium ingot");
        let co2 = flow(&s.old_bio, "old-co2", "Carbon dioxide, fossil", &["air"]);
        link(&s.old, &b, &c, 3.0, ExchangeKind::Technosphere);
        link(&s.old, &b, &d, 1.1, ExchangeKind::Technosphere);
        link(&s.old, &b, &co2, 0.2, ExchangeKind::Biosphere);

        activity(&s.new, "C2", "electricity production", "electricity");
        activity(&s.new, "D2", "aluminium ingot production", "aluminium ingot");
        flow(&s.new_bio, "new-co2", "Carbon dioxide, fossil", &["air"]);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let (reference, found) = migrator
            .migrate("B", &ResolveOptions::default().create_if_not_found())
            .unwrap();

        assert!(found);
        let MigratedRef::Key(key) = reference else {
            panic!("expected a key");
        };
        assert_eq!(s.new.iter_all().unwrap().len(), 3);
        assert_eq!(migrator.stats().created_records, 1);
        let exchanges = s.new.exchanges_of(&key).unwrap();
        assert_eq!(exchanges.len(), 4);
        assert_eq!(exchanges.iter().filter(|e| e.is_production()).count(), 1);
        assert_eq!(exchanges.iter().filter(|e| e.kind == ExchangeKind::Technosphere).count(), 2);
        assert_eq!(exchanges.iter().filter(|e| e.kind == ExchangeKind::Biosphere).count(), 1);
    }

    #[test]
    fn test_source_production_is_never_copied() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let b = activity(&s.old, "B", "aluminium casting", "aluminium");
        let other = activity(&s.old, "X", "aluminium casting, coproduct", "scrap");
        link(&s.old, &b, &b, 1.0, ExchangeKind::Production);
        link(&s.old, &b, &other, 0.5, ExchangeKind::Production);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator.create_if_not_found("B", &ResolveOptions::default()).unwrap();

        let exchanges = s.new.exchanges_of(res.key()).unwrap();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].input, *res.key());
        assert_eq!(exchanges[0].amount, 1.0);
        // X was never touched
        assert_eq!(s.new.iter_all().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_inputs_are_created_recursively() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let a = activity(&s.old, "A", "car production", "car");
        let b = activity(&s.old, "B", "engine production", "engine");
        let c = activity(&s.old, "C", "steel production", "steel");
        link(&s.old, &a, &b, 1.0, ExchangeKind::Technosphere);
        link(&s.old, &b, &c, 150.0, ExchangeKind::Technosphere);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator
            .resolve("A", &ResolveOptions::default().create_if_not_found())
            .unwrap();

        assert_eq!(migrator.stats().created_records, 3);
        let created = s.new.iter_all().unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|r| r.auto_generated));

        let from_a = s.new.exchanges_of(res.key()).unwrap();
        let b_new = s.new.get_by_key(&from_a[1].input).unwrap().unwrap();
        assert_eq!(b_new.name, "engine production");

        let from_b = s.new.exchanges_of(&b_new.key).unwrap();
        let c_new = s.new.get_by_key(&from_b[1].input).unwrap().unwrap();
        assert_eq!(c_new.name, "steel production");
        assert_eq!(from_b[1].amount, 150.0);
    }

    #[test]
    fn test_creation_happens_at_most_once() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let x = activity(&s.old, "X", "car production", "car");
        let y = activity(&s.old, "Y", "truck production", "truck");
        let z = activity(&s.old, "Z", "steel production", "steel");
        link(&s.old, &x, &z, 10.0, ExchangeKind::Technosphere);
        link(&s.old, &y, &z, 20.0, ExchangeKind::Technosphere);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);

        // Z is first cached as not found, then created once as a shared input
        assert!(!migrator.resolve("Z", &ResolveOptions::default()).unwrap().is_found());

        let create = ResolveOptions::default().create_if_not_found();
        let x_new = migrator.resolve("X", &create).unwrap();
        let y_new = migrator.resolve("Y", &create).unwrap();
        assert_eq!(s.new.iter_all().unwrap().len(), 3);

        let z_from_x = &s.new.exchanges_of(x_new.key()).unwrap()[1].input;
        let z_from_y = &s.new.exchanges_of(y_new.key()).unwrap()[1].input;
        assert_eq!(z_from_x, z_from_y);

        let again = migrator.create_if_not_found("X", &create).unwrap();
        assert_eq!(again.key(), x_new.key());
        assert_eq!(migrator.stats().created_records, 3);
    }

    #[test]
    fn test_loop_resolves_to_record_in_progress() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let a = activity(&s.old, "A", "heat production", "heat");
        let b = activity(&s.old, "B", "electricity production", "electricity");
        link(&s.old, &a, &a, 0.01, ExchangeKind::Technosphere);
        link(&s.old, &a, &b, 0.3, ExchangeKind::Technosphere);
        link(&s.old, &b, &a, 0.2, ExchangeKind::Technosphere);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator
            .resolve("A", &ResolveOptions::default().create_if_not_found())
            .unwrap();

        assert_eq!(s.new.iter_all().unwrap().len(), 2);
        assert_eq!(res.strategy(), MatchStrategy::Created);
        assert_eq!(migrator.stats().exact, 0);
        assert_eq!(migrator.stats().created_records, 2);

        let from_a = s.new.exchanges_of(res.key()).unwrap();
        assert_eq!(from_a[1].input, *res.key());

        let b_new = &from_a[2].input;
        let from_b = s.new.exchanges_of(b_new).unwrap();
        assert_eq!(from_b[1].input, *res.key());
    }

    #[test]
    fn test_cycle_through_not_found_entry_is_an_error() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let a = activity(&s.old, "A", "heat production", "heat");
        let b = activity(&s.old, "B", "electricity production", "electricity");
        link(&s.old, &a, &b, 0.3, ExchangeKind::Technosphere);
        link(&s.old, &b, &a, 0.2, ExchangeKind::Technosphere);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        // A stays cached as not found while it is being created
        assert!(!migrator.resolve("A", &ResolveOptions::default()).unwrap().is_found());

        let err = migrator
            .create_if_not_found("A", &ResolveOptions::default())
            .unwrap_err();

        match err {
            Error::CyclicGraph { cycle } => {
                assert_eq!(cycle, "lca://old/ei#A -> lca://old/ei#B -> lca://old/ei#A");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_creation_rolls_back() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let b = activity(&s.old, "B", "aluminium casting", "aluminium");
        let c = activity(&s.old, "C", "electricity production", "electricity");
        let exotic = flow(&s.old_bio, "old-x", "Unobtainium emission", &["soil"]);
        link(&s.old, &b, &c, 3.0, ExchangeKind::Technosphere);
        link(&s.old, &b, &exotic, 0.1, ExchangeKind::Biosphere);
        flow(&s.new_bio, "ch4", "Methane, fossil", &["air"]);

        let create = ResolveOptions::default().create_if_not_found();
        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let err = backend
            .in_transaction(|| migrator.resolve("B", &create))
            .unwrap_err();
        assert!(matches!(err, Error::BiosphereNotFound { .. }));
        // B' and C' were written before the flow lookup failed
        assert_eq!(migrator.stats().created_records, 2);

        assert!(s.new.iter_all().unwrap().is_empty());
        assert_eq!(backend.count_exchanges().unwrap(), 2);

        let mut fresh = Migrator::new(&s.old, &s.new, &s.new_bio);
        assert!(!fresh.resolve("B", &ResolveOptions::default()).unwrap().is_found());
    }

    #[test]
    fn test_fuzzy_tie_break_sees_every_tied_candidate() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        activity(&s.old, "a", "steel production", "steel");
        for code in ["f", "e", "d", "c", "b", "a0"] {
            activity(&s.new, code, &format!("steel production, variant {code}"), "steel");
        }

        let scorer = |_: &str, _: &str| -> u8 { 90 };
        let mut migrator =
            Migrator::with_scorer(&s.old, &s.new, &s.new_bio, MigratorSettings::default(), scorer);
        let res = migrator.resolve("a", &ResolveOptions::default().fuzzy(85)).unwrap();

        assert_eq!(res.code(), "a0");
        assert!(matches!(res.strategy(), MatchStrategy::Fuzzy { score: 90 }));
        assert_eq!(migrator.stats().ties, 1);
    }

    #[test]
    fn test_biosphere_fuzzy_tie_break_sees_every_tied_candidate() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        for code in ["f", "e", "d", "c", "b", "a0"] {
            flow(&s.new_bio, code, &format!("Carbon dioxide, {code}"), &["air"]);
        }

        let scorer = |_: &str, _: &str| -> u8 { 75 };
        let mut migrator =
            Migrator::with_scorer(&s.old, &s.new, &s.new_bio, MigratorSettings::default(), scorer);
        let res = migrator.resolve_biosphere(&co2_details()).unwrap();

        assert_eq!(res.code(), "a0");
        assert!(matches!(res.strategy(), MatchStrategy::BiosphereFuzzy { score: 75 }));
    }

    #[test]
    fn test_duplicate_exchange_truncates_copy() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);

        let a = activity(&s.old, "A", "car production", "car");
        let b = activity(&s.old, "B", "steel production", "steel");
        let c = activity(&s.old, "C", "glass production", "glass");
        link(&s.old, &a, &b, 1.0, ExchangeKind::Technosphere);
        link(&s.old, &a, &b, 1.0, ExchangeKind::Technosphere);
        link(&s.old, &a, &c, 1.0, ExchangeKind::Technosphere);
        activity(&s.new, "B2", "steel production", "steel");
        activity(&s.new, "C2", "glass production", "glass");

        let mut legacy = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = legacy.create_if_not_found("A", &ResolveOptions::default()).unwrap();
        assert_eq!(s.new.exchanges_of(res.key()).unwrap().len(), 2);
        assert_eq!(legacy.stats().truncated, 1);

        let settings = MigratorSettings {
            duplicates: DuplicatePolicy::SkipDuplicate,
            ..MigratorSettings::default()
        };
        let mut skipping = Migrator::with_settings(&s.old, &s.new, &s.new_bio, settings);
        let res = skipping.create_if_not_found("A", &ResolveOptions::default()).unwrap();
        assert_eq!(s.new.exchanges_of(res.key()).unwrap().len(), 3);
        assert_eq!(skipping.stats().skipped_duplicates, 1);
    }

    #[test]
    fn test_biosphere_exact() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        flow(&s.new_bio, "co2-water", "Carbon dioxide, fossil", &["water"]);
        let air = flow(&s.new_bio, "co2-air", "Carbon dioxide, fossil", &["air"]);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator.resolve_biosphere(&co2_details()).unwrap();

        assert_eq!(res.key(), &air.key);
        assert_eq!(res.strategy(), MatchStrategy::BiosphereExact);

        // cached by flow attributes, not by exchange
        let mut other = co2_details();
        other.amount = 99.0;
        other.input = RecordKey::new("old", "biosphere3", "elsewhere");
        assert_eq!(migrator.resolve_biosphere(&other).unwrap(), res);
        assert_eq!(migrator.stats().scans, 1);
    }

    #[test]
    fn test_biosphere_multiple_exact_uses_tie_break() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        flow(&s.new_bio, "zz", "Carbon dioxide, fossil", &["air"]);
        flow(&s.new_bio, "aa", "Carbon dioxide, fossil", &["air"]);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator.resolve_biosphere(&co2_details()).unwrap();

        assert_eq!(res.code(), "aa");
        assert_eq!(res.strategy(), MatchStrategy::BiosphereExact);
        assert_eq!(migrator.stats().ties, 1);
    }

    #[test]
    fn test_biosphere_fuzzy_fallback() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        let renamed = flow(&s.new_bio, "co2", "Carbon dioxide (fossil)", &["air"]);
        flow(&s.new_bio, "ch4", "Methane, fossil", &["air"]);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let res = migrator.resolve_biosphere(&co2_details()).unwrap();

        assert_eq!(res.key(), &renamed.key);
        assert!(matches!(res.strategy(), MatchStrategy::BiosphereFuzzy { score: 100 }));
    }

    #[test]
    fn test_biosphere_not_found() {
        let backend = SqliteStore::open_in_memory().unwrap();
        let s = stores(&backend);
        flow(&s.new_bio, "ch4", "Methane, fossil", &["air"]);

        let mut details = co2_details();
        details.name = "Unobtainium emission".to_string();
        details.categories = Some(vec!["soil".to_string()]);

        let mut migrator = Migrator::new(&s.old, &s.new, &s.new_bio);
        let err = migrator.resolve_biosphere(&details).unwrap_err();

        match err {
            Error::BiosphereNotFound { store, name, .. } => {
                assert_eq!(store, "biosphere3");
                assert_eq!(name, "Unobtainium emission");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
