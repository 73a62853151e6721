use crate::error::{AppResult, Error};
use crate::models::{DetailsResponse, ListField, MovieRecord, Source};
use crate::normalize::{self, relative_image_path};
use crate::store::MovieStore;
use crate::tmdb::{MovieDetails, TmdbApi};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STALENESS_DAYS: i64 = 7;
const MAX_CAST: usize = 5;

// Concurrent misses for the same id both fetch and write; the last write wins.
#[derive(Clone)]
pub struct DetailResolver {
    tmdb: Arc<dyn TmdbApi>,
    store: Arc<dyn MovieStore>,
}

impl DetailResolver {
    pub fn new(tmdb: Arc<dyn TmdbApi>, store: Arc<dyn MovieStore>) -> Self {
        Self { tmdb, store }
    }

    pub async fn movie_details(&self, id: i64) -> AppResult<DetailsResponse> {
        if id <= 0 {
            return Err(Error::invalid("movie id must be a positive integer"));
        }

        if let Some(record) = self.store.get(id).await? {
            if is_fresh(&record, Utc::now()) {
                debug!(tmdb_id = id, "Serving movie from cache");
                return Ok(DetailsResponse {
                    success: true,
                    source: Source::Cache,
                    movie: normalize::display_movie(&record),
                });
            }
            debug!(tmdb_id = id, updated_at = ?record.updated_at, "Cached movie is stale");
        }

        let details = self.tmdb.movie_details(id).await?;
        if details.id <= 0 {
            return Err(Error::NotFound);
        }
        let record = enrich(details);
        info!("Fetched '{}' (tmdb id {}) from TMDB", record.title, record.id);

        // The caller still gets the fresh data if the write-back fails.
        if let Err(e) = self.store.upsert(&for_storage(&record)).await {
            warn!("Failed to cache movie {}: {}", record.id, e);
        }

        Ok(DetailsResponse {
            success: true,
            source: Source::Api,
            movie: normalize::display_movie(&record),
        })
    }
}

// A timestamp ahead of the clock counts as stale so skew cannot pin a row.
pub fn is_fresh(record: &MovieRecord, now: DateTime<Utc>) -> bool {
    record
        .updated_at
        .map(|at| at <= now && now - at < Duration::days(STALENESS_DAYS))
        .unwrap_or(false)
}

pub fn enrich(details: MovieDetails) -> MovieRecord {
    let (director, cast) = match &details.credits {
        Some(credits) => {
            let director = credits
                .crew
                .iter()
                .find(|c| c.job.as_deref() == Some("Director"))
                .and_then(|c| c.name.clone());
            let cast = credits
                .cast
                .iter()
                .take(MAX_CAST)
                .filter_map(|c| c.name.clone())
                .collect();
            (director, ListField::Decoded(cast))
        }
        None => (None, ListField::Absent),
    };
    let genres = details
        .genres
        .iter()
        .filter_map(|g| g.name.clone())
        .collect();

    MovieRecord {
        id: details.id,
        title: details.title.unwrap_or_default(),
        original_title: details.original_title.unwrap_or_default(),
        overview: details.overview.unwrap_or_default(),
        release_date: details.release_date.unwrap_or_default(),
        poster_path: details.poster_path.unwrap_or_default(),
        backdrop_path: details.backdrop_path.unwrap_or_default(),
        vote_average: details.vote_average.unwrap_or_default(),
        vote_count: details.vote_count.unwrap_or_default().max(0),
        runtime: details.runtime.unwrap_or_default().max(0),
        genres: ListField::Decoded(genres),
        cast,
        director,
        updated_at: None,
    }
}

pub fn for_storage(record: &MovieRecord) -> MovieRecord {
    MovieRecord {
        poster_path: relative_image_path(&record.poster_path),
        backdrop_path: relative_image_path(&record.backdrop_path),
        ..record.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteMovieStore;
    use crate::tmdb::{CastMember, Credits, CrewMember, Genre, SearchResponse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeTmdb {
        details: AppResult<MovieDetails>,
        calls: Mutex<u32>,
    }

    impl FakeTmdb {
        fn returning(details: MovieDetails) -> Self {
            Self {
                details: Ok(details),
                calls: Mutex::new(0),
            }
        }

        fn failing(err: Error) -> Self {
            Self {
                details: Err(err),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TmdbApi for FakeTmdb {
        async fn search_movies(&self, _query: &str, _page: u32) -> AppResult<SearchResponse> {
            panic!("details must not search");
        }
        async fn movie_details(&self, _id: i64) -> AppResult<MovieDetails> {
            *self.calls.lock().unwrap() += 1;
            match &self.details {
                Ok(d) => Ok(d.clone()),
                Err(Error::NotFound) => Err(Error::NotFound),
                Err(Error::ProviderError(m)) => Err(Error::ProviderError(m.clone())),
                Err(e) => Err(Error::ProviderUnavailable(e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeStore {
        rows: Mutex<HashMap<i64, MovieRecord>>,
        upserts: Mutex<Vec<MovieRecord>>,
        fail_writes: bool,
    }

    impl FakeStore {
        fn with_row(record: MovieRecord) -> Self {
            let store = FakeStore::default();
            store.rows.lock().unwrap().insert(record.id, record);
            store
        }
    }

    #[async_trait]
    impl MovieStore for FakeStore {
        async fn get(&self, id: i64) -> AppResult<Option<MovieRecord>> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }
        async fn upsert(&self, record: &MovieRecord) -> AppResult<()> {
            if self.fail_writes {
                return Err(Error::Store("disk full".to_string()));
            }
            let mut stored = record.clone();
            stored.updated_at = Some(Utc::now());
            self.upserts.lock().unwrap().push(stored.clone());
            self.rows.lock().unwrap().insert(stored.id, stored);
            Ok(())
        }
        async fn count(&self) -> AppResult<u64> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }
    }

    fn fight_club() -> MovieDetails {
        MovieDetails {
            id: 550,
            title: Some("Fight Club".to_string()),
            original_title: Some("Fight Club".to_string()),
            overview: Some("An insomniac office worker...".to_string()),
            release_date: Some("1999-10-15".to_string()),
            poster_path: Some("https://image.tmdb.org/t/p/w500/poster.jpg".to_string()),
            backdrop_path: Some("/backdrop.jpg".to_string()),
            vote_average: Some(8.438),
            vote_count: Some(26280),
            runtime: Some(139),
            genres: vec![Genre {
                id: Some(18),
                name: Some("Drama".to_string()),
            }],
            credits: Some(Credits {
                cast: ["Edward Norton", "Brad Pitt", "Helena Bonham Carter", "Meat Loaf", "Jared Leto", "Zach Grenier"]
                    .iter()
                    .map(|n| CastMember {
                        name: Some(n.to_string()),
                    })
                    .collect(),
                crew: vec![
                    CrewMember {
                        job: Some("Producer".to_string()),
                        name: Some("Art Linson".to_string()),
                    },
                    CrewMember {
                        job: Some("Director".to_string()),
                        name: Some("David Fincher".to_string()),
                    },
                    CrewMember {
                        job: Some("Director".to_string()),
                        name: Some("Someone Else".to_string()),
                    },
                ],
            }),
        }
    }

    fn stored(id: i64, age: Duration) -> MovieRecord {
        MovieRecord {
            id,
            title: "Cached Title".to_string(),
            release_date: "1999-10-15".to_string(),
            poster_path: "/poster.jpg".to_string(),
            genres: ListField::Legacy("Drama".to_string()),
            updated_at: Some(Utc::now() - age),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_non_positive_ids() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let resolver = DetailResolver::new(tmdb.clone(), Arc::new(FakeStore::default()));
        for id in [0, -1, i64::MIN] {
            assert!(matches!(
                resolver.movie_details(id).await,
                Err(Error::InvalidArgument(_))
            ));
        }
        assert_eq!(tmdb.calls(), 0);
    }

    #[tokio::test]
    async fn fresh_record_is_served_without_provider_call() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let store = Arc::new(FakeStore::with_row(stored(550, Duration::days(6))));
        let resolver = DetailResolver::new(tmdb.clone(), store.clone());

        let res = resolver.movie_details(550).await.unwrap();
        assert_eq!(res.source, Source::Cache);
        assert_eq!(res.movie.title, "Cached Title");
        assert_eq!(res.movie.genres, "Drama");
        assert_eq!(tmdb.calls(), 0);
        assert!(store.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_record_is_refreshed_once() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let store = Arc::new(FakeStore::with_row(stored(550, Duration::days(8))));
        let resolver = DetailResolver::new(tmdb.clone(), store.clone());

        let res = resolver.movie_details(550).await.unwrap();
        assert_eq!(res.source, Source::Api);
        assert_eq!(res.movie.title, "Fight Club");
        assert_eq!(tmdb.calls(), 1);
        assert_eq!(store.upserts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_record_is_fetched_enriched_and_stored() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let store = Arc::new(FakeStore::default());
        let resolver = DetailResolver::new(tmdb.clone(), store.clone());

        let res = resolver.movie_details(550).await.unwrap();
        assert_eq!(res.source, Source::Api);
        assert_eq!(res.movie.director, "David Fincher");
        assert_eq!(
            res.movie.cast,
            "Edward Norton, Brad Pitt, Helena Bonham Carter, Meat Loaf, Jared Leto"
        );
        assert_eq!(res.movie.runtime, "2h19");
        assert_eq!(res.movie.rating, "8.4");
        assert_eq!(res.movie.vote_count, "26,280");
        assert_eq!(res.movie.release_date, "15/10/1999");
        // Response keeps the provider's absolute URL.
        assert_eq!(res.movie.poster, "https://image.tmdb.org/t/p/w500/poster.jpg");
        assert_eq!(res.movie.backdrop, "https://image.tmdb.org/t/p/w780/backdrop.jpg");

        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].poster_path, "/poster.jpg");
        assert_eq!(upserts[0].backdrop_path, "/backdrop.jpg");
        assert_eq!(tmdb.calls(), 1);
    }

    #[tokio::test]
    async fn second_lookup_hits_the_cache() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let resolver = DetailResolver::new(tmdb.clone(), Arc::new(FakeStore::default()));

        let first = resolver.movie_details(550).await.unwrap();
        let second = resolver.movie_details(550).await.unwrap();
        assert_eq!(first.source, Source::Api);
        assert_eq!(second.source, Source::Cache);
        assert_eq!(first.movie, second.movie);
        assert_eq!(tmdb.calls(), 1);
    }

    #[tokio::test]
    async fn absolute_poster_round_trips_through_sqlite() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let store = Arc::new(SqliteMovieStore::open_in_memory().unwrap());
        let resolver = DetailResolver::new(tmdb, store.clone());

        resolver.movie_details(550).await.unwrap();
        let row = store.get(550).await.unwrap().unwrap();
        assert_eq!(row.poster_path, "/poster.jpg");

        let cached = resolver.movie_details(550).await.unwrap();
        assert_eq!(cached.source, Source::Cache);
        assert_eq!(cached.movie.poster, "https://image.tmdb.org/t/p/w500/poster.jpg");
    }

    #[tokio::test]
    async fn stale_sqlite_row_triggers_refresh() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let store = Arc::new(SqliteMovieStore::open_in_memory().unwrap());
        store
            .upsert_at(&stored(550, Duration::zero()), Utc::now() - Duration::days(STALENESS_DAYS))
            .await
            .unwrap();
        let resolver = DetailResolver::new(tmdb.clone(), store);

        let res = resolver.movie_details(550).await.unwrap();
        assert_eq!(res.source, Source::Api);
        assert_eq!(tmdb.calls(), 1);
    }

    #[tokio::test]
    async fn write_back_failure_still_returns_fresh_data() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let store = Arc::new(FakeStore {
            fail_writes: true,
            ..Default::default()
        });
        let resolver = DetailResolver::new(tmdb, store);

        let res = resolver.movie_details(550).await.unwrap();
        assert_eq!(res.source, Source::Api);
        assert_eq!(res.movie.title, "Fight Club");
    }

    #[tokio::test]
    async fn provider_not_found_and_errors_propagate() {
        let store = Arc::new(FakeStore::default());
        let resolver = DetailResolver::new(Arc::new(FakeTmdb::failing(Error::NotFound)), store.clone());
        assert!(matches!(resolver.movie_details(9).await, Err(Error::NotFound)));

        let resolver = DetailResolver::new(
            Arc::new(FakeTmdb::failing(Error::ProviderError("rate limited".to_string()))),
            store.clone(),
        );
        assert!(matches!(
            resolver.movie_details(9).await,
            Err(Error::ProviderError(m)) if m == "rate limited"
        ));
        assert!(store.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_id_payload_is_not_found() {
        let resolver = DetailResolver::new(
            Arc::new(FakeTmdb::returning(MovieDetails::default())),
            Arc::new(FakeStore::default()),
        );
        assert!(matches!(resolver.movie_details(5).await, Err(Error::NotFound)));
    }

    #[test]
    fn freshness_boundary() {
        let now = Utc::now();
        let mut record = MovieRecord::default();
        assert!(!is_fresh(&record, now));
        record.updated_at = Some(now - Duration::days(STALENESS_DAYS) + Duration::seconds(1));
        assert!(is_fresh(&record, now));
        record.updated_at = Some(now - Duration::days(STALENESS_DAYS));
        assert!(!is_fresh(&record, now));
        record.updated_at = Some(now);
        assert!(is_fresh(&record, now));
    }

    #[test]
    fn future_timestamps_are_stale() {
        let now = Utc::now();
        let record = MovieRecord {
            updated_at: Some(now + Duration::hours(1)),
            ..Default::default()
        };
        assert!(!is_fresh(&record, now));
    }

    #[tokio::test]
    async fn future_dated_record_is_refreshed() {
        let tmdb = Arc::new(FakeTmdb::returning(fight_club()));
        let mut row = stored(550, Duration::zero());
        row.updated_at = Some(Utc::now() + Duration::days(30));
        let store = Arc::new(FakeStore::with_row(row));
        let resolver = DetailResolver::new(tmdb.clone(), store.clone());

        let res = resolver.movie_details(550).await.unwrap();
        assert_eq!(res.source, Source::Api);
        assert_eq!(tmdb.calls(), 1);
    }

    #[test]
    fn enrich_without_credits_leaves_cast_absent() {
        let mut details = fight_club();
        details.credits = None;
        let record = enrich(details);
        assert_eq!(record.director, None);
        assert_eq!(record.cast, ListField::Absent);
        assert_eq!(record.genres, ListField::Decoded(vec!["Drama".to_string()]));
    }
}
