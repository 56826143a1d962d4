//! The Source Adapter: a common request shape over heterogeneous sources.

use crate::{
    concept::{Concept, ConceptResolver, SubstringResolver},
    date_range::DateRange,
    entity::Entity,
    error::SourceError,
    observation::RawSeries,
    time_series::TimeSeries,
};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeMap;

/// A remote provider of dated values for named variables.
///
/// Implementations are stateless request/response wrappers; they never
/// retry and report transport failures as [`SourceError::SourceUnavailable`].
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Human-readable source name, used in errors and reports.
    fn name(&self) -> &str;

    /// First and last dates the source holds, when it can tell.
    async fn coverage(&self) -> Result<Option<DateRange>, SourceError> {
        Ok(None)
    }

    /// Native variable names available for `entity`.
    async fn catalogue(&self, entity: &Entity) -> Result<Vec<String>, SourceError>;

    /// Values of one native variable for `entity` over `range`.
    async fn query(
        &self,
        variable: &str,
        entity: &Entity,
        range: &DateRange,
    ) -> Result<RawSeries, SourceError>;

    /// Several variables at once. Sources that can answer in a single
    /// request override this; the result is in the order of `variables`.
    async fn query_many(
        &self,
        variables: &[String],
        entity: &Entity,
        range: &DateRange,
    ) -> Result<Vec<RawSeries>, SourceError> {
        let mut results = Vec::with_capacity(variables.len());
        for variable in variables {
            results.push(self.query(variable, entity, range).await?);
        }
        Ok(results)
    }
}

/// Resolves concepts against a source's catalogue and returns series
/// attached to the requested entity.
pub struct SourceAdapter<'a> {
    source: &'a dyn TimeSeriesSource,
    resolver: Box<dyn ConceptResolver + 'a>,
}

impl<'a> SourceAdapter<'a> {
    /// Adapter using case-insensitive substring matching.
    pub fn new(source: &'a dyn TimeSeriesSource) -> Self {
        Self::with_resolver(source, SubstringResolver)
    }

    pub fn with_resolver(
        source: &'a dyn TimeSeriesSource,
        resolver: impl ConceptResolver + 'a,
    ) -> Self {
        SourceAdapter {
            source,
            resolver: Box::new(resolver),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    fn resolve_in(&self, concept: &Concept, catalogue: &[String]) -> Result<String, SourceError> {
        self.resolver
            .resolve(concept, catalogue)
            .ok_or_else(|| SourceError::VariableNotFound {
                source_name: self.source.name().to_string(),
                concept: concept.to_string(),
            })
    }

    /// Native name for `concept` at `entity`.
    pub async fn resolve(&self, entity: &Entity, concept: &Concept) -> Result<String, SourceError> {
        let catalogue = self.source.catalogue(entity).await?;
        self.resolve_in(concept, &catalogue)
    }

    /// One series for one concept.
    pub async fn fetch(
        &self,
        entity: &Entity,
        concept: &Concept,
        range: &DateRange,
    ) -> Result<TimeSeries, SourceError> {
        let mut all = self.fetch_many(entity, std::slice::from_ref(concept), range).await?;
        all.remove(concept).ok_or_else(|| SourceError::VariableNotFound {
            source_name: self.source.name().to_string(),
            concept: concept.to_string(),
        })
    }

    /// Series for several concepts, keyed by concept. The catalogue is read
    /// once; any unresolvable concept fails the whole request.
    pub async fn fetch_many(
        &self,
        entity: &Entity,
        concepts: &[Concept],
        range: &DateRange,
    ) -> Result<BTreeMap<Concept, TimeSeries>, SourceError> {
        let catalogue = self.source.catalogue(entity).await?;
        let variables = concepts
            .iter()
            .map(|concept| self.resolve_in(concept, &catalogue))
            .collect::<Result<Vec<String>, _>>()?;
        debug!(
            "{}: querying {:?} for {} ({} to {})",
            self.source.name(),
            variables,
            entity.id,
            range.start,
            range.end
        );
        let raw = match self.source.query_many(&variables, entity, range).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{}: query for {} failed: {}", self.source.name(), entity.id, e);
                return Err(e);
            }
        };
        if raw.len() != variables.len() {
            return Err(SourceError::unavailable(
                self.source.name(),
                format!("expected {} series, got {}", variables.len(), raw.len()),
            ));
        }
        Ok(concepts
            .iter()
            .cloned()
            .zip(variables.iter().zip(raw))
            .map(|(concept, (variable, raw))| {
                (concept, TimeSeries::from_raw(&entity.id, variable, raw))
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::concept::ExactResolver;
    use crate::observation::SeriesPoint;
    use chrono::NaiveDate;

    /// In-memory source with a fixed catalogue and one series per variable.
    pub(crate) struct FixedSource {
        pub bands: Vec<String>,
        pub fail: bool,
    }

    #[async_trait]
    impl TimeSeriesSource for FixedSource {
        fn name(&self) -> &str {
            "Fixed"
        }

        async fn catalogue(&self, _entity: &Entity) -> Result<Vec<String>, SourceError> {
            Ok(self.bands.clone())
        }

        async fn query(
            &self,
            variable: &str,
            _entity: &Entity,
            range: &DateRange,
        ) -> Result<RawSeries, SourceError> {
            if self.fail {
                return Err(SourceError::unavailable("Fixed", "connection reset"));
            }
            let points = range
                .days()
                .enumerate()
                .map(|(i, date)| SeriesPoint {
                    date,
                    value: if i % 2 == 0 { Some(variable.len() as f64) } else { None },
                })
                .collect();
            Ok(RawSeries {
                unit: "mm".to_string(),
                points,
            })
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_resolves_native_name() {
        let source = FixedSource {
            bands: vec!["prcp".into(), "tmin".into()],
            fail: false,
        };
        let adapter = SourceAdapter::new(&source);
        let entity = Entity::point("Rockies", -106.5, 39.5);
        let series = adapter
            .fetch(&entity, &Concept::Precipitation, &range())
            .await
            .unwrap();
        assert_eq!(series.variable_name(), "prcp");
        assert_eq!(series.entity_id(), "Rockies");
        assert_eq!(series.len(), 4);
        assert_eq!(series.valid().count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_many_keyed_by_concept() {
        let source = FixedSource {
            bands: vec!["prcp".into(), "tmin".into()],
            fail: false,
        };
        let adapter = SourceAdapter::new(&source);
        let entity = Entity::point("Rockies", -106.5, 39.5);
        let all = adapter
            .fetch_many(
                &entity,
                &[Concept::MinTemperature, Concept::Precipitation],
                &range(),
            )
            .await
            .unwrap();
        assert_eq!(all[&Concept::MinTemperature].variable_name(), "tmin");
        assert_eq!(all[&Concept::Precipitation].variable_name(), "prcp");
    }

    #[tokio::test]
    async fn test_variable_not_found_names_source_and_concept() {
        let source = FixedSource {
            bands: vec!["prcp".into()],
            fail: false,
        };
        let adapter = SourceAdapter::new(&source);
        let entity = Entity::point("Rockies", -106.5, 39.5);
        let err = adapter
            .fetch(&entity, &Concept::SnowCover, &range())
            .await
            .unwrap_err();
        match err {
            SourceError::VariableNotFound {
                source_name,
                concept,
            } => {
                assert_eq!(source_name, "Fixed");
                assert_eq!(concept, "snow cover");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unavailable_propagates() {
        let source = FixedSource {
            bands: vec!["prcp".into()],
            fail: true,
        };
        let adapter = SourceAdapter::new(&source);
        let entity = Entity::point("Rockies", -106.5, 39.5);
        let err = adapter
            .fetch(&entity, &Concept::Precipitation, &range())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "SourceUnavailable");
    }

    #[tokio::test]
    async fn test_pluggable_resolver() {
        let source = FixedSource {
            bands: vec!["precip_total".into(), "prcp".into()],
            fail: false,
        };
        let resolver = ExactResolver::new().with(Concept::Precipitation, "precip_total");
        let adapter = SourceAdapter::with_resolver(&source, resolver);
        let entity = Entity::point("Rockies", -106.5, 39.5);
        let name = adapter.resolve(&entity, &Concept::Precipitation).await.unwrap();
        assert_eq!(name, "precip_total");
    }
}
