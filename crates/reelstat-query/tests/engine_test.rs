//! Query engine over a store filled by the ingestion merge functions.

use std::io::Write;

use tempfile::TempDir;

use reelstat_core::model::UserId;
use reelstat_core::schema::Database;
use reelstat_etl::merge::{merge_basics, merge_episode, merge_rating, merge_rows};
use reelstat_etl::rows::{BasicsRow, EpisodeRow, RatingRow};
use reelstat_etl::import_user_ratings_file;
use reelstat_query::{
    QueryConfig, QueryEngine, SortDirection, UserRatingQuery, UserRatingSort,
};

fn rating(imdb_id: &str, average_rating: f64, num_votes: u64) -> RatingRow {
    RatingRow {
        imdb_id: imdb_id.to_string(),
        average_rating,
        num_votes,
    }
}

fn basics(imdb_id: &str, title_type: &str, name: &str, year: i32) -> BasicsRow {
    BasicsRow {
        imdb_id: imdb_id.to_string(),
        title_type: Some(title_type.to_string()),
        primary_title: Some(name.to_string()),
        start_year: Some(year),
        end_year: None,
        runtime_minutes: None,
        genres: vec!["Drama".to_string()],
    }
}

fn episode(imdb_id: &str, season: u32, number: u32) -> EpisodeRow {
    EpisodeRow {
        imdb_id: imdb_id.to_string(),
        parent_imdb_id: "tt0903747".to_string(),
        season: Some(season),
        episode: Some(number),
    }
}

fn ingest(db: &Database) {
    let mut ratings = vec![
        rating("tt0903747", 9.5, 2_000_000),
        rating("tt0959621", 9.0, 40_000),
        rating("tt1054724", 8.6, 30_000),
        rating("tt1232244", 9.9, 180_000),
        rating("tt0068646", 9.2, 1_000_000),
        rating("tt7000001", 6.1, 10),
        rating("tt0111161", 9.3, 2_800_000),
    ];
    let mut titles = vec![
        basics("tt0903747", "tvSeries", "Breaking Bad", 2008),
        basics("tt0959621", "tvEpisode", "Pilot", 2008),
        basics("tt1054724", "tvEpisode", "Cat's in the Bag...", 2008),
        basics("tt1232244", "tvEpisode", "Ozymandias", 2013),
        basics(
            "tt0068646",
            "movie",
            "The Godfather Part Two Extended Edition",
            1974,
        ),
        basics("tt7000001", "movie", "Godfather", 2001),
        basics("tt0111161", "movie", "The Shawshank Redemption", 1994),
    ];
    let fillers = [
        "Blue Harbor",
        "Quiet Orchard",
        "Silent Meadow",
        "Iron Lantern",
        "Paper Comet",
        "Velvet Canyon",
        "Hollow Summit",
        "Amber Tide",
    ];
    for (i, name) in fillers.iter().enumerate() {
        let imdb_id = format!("tt80000{i:02}");
        ratings.push(rating(&imdb_id, 5.0, 500));
        titles.push(basics(&imdb_id, "movie", name, 2010));
    }
    let episodes = vec![
        episode("tt0959621", 1, 1),
        episode("tt1054724", 1, 2),
        episode("tt1232244", 5, 14),
    ];

    merge_rows(db, "ratings", &ratings, 0, merge_rating).unwrap();
    merge_rows(db, "basics", &titles, 0, merge_basics).unwrap();
    merge_rows(db, "episodes", &episodes, 0, merge_episode).unwrap();
}

fn import(db: &Database, dir: &TempDir, user: &UserId) {
    let path = dir.path().join(format!("{user}.csv"));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(
        b"const,rating,date
tt0903747,10,2021-01-03
tt0959621,7,2021-01-01
tt1232244,10,2021-01-02
tt0068646,3,2021-02-01
tt0111161,9,2020-12-25
tt0000404,5,2021-03-01
tt0111162,11,2021-03-01
",
    )
    .unwrap();
    import_user_ratings_file(db, user, &path, true).unwrap();
    assert!(!path.exists());
}

fn setup() -> (TempDir, QueryEngine, UserId) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("reelstat.db")).unwrap();
    ingest(&db);
    let user = UserId::new();
    import(&db, &dir, &user);
    (dir, QueryEngine::new(db, QueryConfig::default()), user)
}

#[test]
fn test_search_boosts_popular_titles() {
    let (_dir, engine, _user) = setup();
    let hits = engine.search_by_name("godfather", None).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.title.imdb_id.as_str()).collect();
    assert_eq!(ids, vec!["tt0068646", "tt7000001"]);
    assert!(hits[0].score > hits[1].score);

    assert!(engine
        .search_by_name("godfather", Some("tvSeries"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_search_ignores_case_and_diacritics() {
    let (_dir, engine, _user) = setup();
    let hits = engine.search_by_name("SHAWSHÄNK", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title.imdb_id, "tt0111161");
}

#[test]
fn test_episodes_with_user_rating() {
    let (_dir, engine, user) = setup();
    let result = engine
        .get_episodes_with_user_rating("tt0903747", &user)
        .unwrap()
        .unwrap();
    assert_eq!(result.series.user_rating, Some(10));

    let episodes: Vec<(&str, Option<u8>)> = result
        .episodes
        .iter()
        .map(|e| (e.title.imdb_id.as_str(), e.user_rating))
        .collect();
    assert_eq!(
        episodes,
        vec![
            ("tt0959621", Some(7)),
            ("tt1054724", None),
            ("tt1232244", Some(10)),
        ]
    );
}

#[test]
fn test_point_lookup_with_user_rating() {
    let (_dir, engine, user) = setup();
    let rated = engine
        .get_by_external_id_with_user_rating("tt0111161", &user)
        .unwrap()
        .unwrap();
    assert_eq!(rated.user_rating, Some(9));

    let unrated = engine
        .get_by_external_id_with_user_rating("tt1054724", &user)
        .unwrap()
        .unwrap();
    assert!(unrated.user_rating.is_none());

    assert!(engine
        .get_by_external_id_with_user_rating("tt0000404", &user)
        .unwrap()
        .is_none());
}

#[test]
fn test_season_rollup_of_rated_series() {
    let (_dir, engine, user) = setup();
    let series = engine.get_seasons_from_user_rated_series(&user).unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].imdb_id, "tt0903747");
    assert_eq!(series[0].user_rating, 10);

    let seasons = &series[0].seasons;
    assert_eq!(seasons.len(), 2);
    assert_eq!(seasons[0].season, 1);
    assert_eq!(seasons[0].rating, 8.8);
    assert_eq!(seasons[0].user_rating, Some(7.0));
    assert_eq!(seasons[0].episode_count, 2);
    assert_eq!(seasons[0].user_rated_episode_count, 1);
    assert_eq!(seasons[1].season, 5);
    assert_eq!(seasons[1].rating, 9.9);
    assert_eq!(seasons[1].user_rating, Some(10.0));
}

#[test]
fn test_analysis() {
    let (_dir, engine, user) = setup();
    let analysis = engine.get_analysis(&user).unwrap();

    let types: Vec<&str> = analysis
        .distribution
        .iter()
        .map(|d| d.title_type.as_str())
        .collect();
    assert_eq!(types, vec!["movie", "tvEpisode", "tvSeries"]);
    assert_eq!(analysis.distribution[0].ratings[2], 1);
    assert_eq!(analysis.distribution[0].ratings[8], 1);

    let movies = &analysis.avg_difference[0];
    assert_eq!(movies.count, 2);
    assert!((movies.mean() - (-6.2 - 0.3) / 2.0).abs() < 1e-9);

    assert_eq!(analysis.max_difference.len(), 5);
    assert_eq!(analysis.max_difference[0].imdb_id, "tt0068646");
    assert!((analysis.max_difference[0].difference + 6.2).abs() < 1e-9);
}

#[test]
fn test_list_user_ratings() {
    let (_dir, engine, user) = setup();

    let all = engine
        .list_user_ratings(&user, &UserRatingQuery::default())
        .unwrap();
    assert_eq!(all.pagination.count, 5);
    let ids: Vec<&str> = all.items.iter().map(|r| r.title.imdb_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["tt0111161", "tt0959621", "tt1232244", "tt0903747", "tt0068646"]
    );

    let episodes = engine
        .list_user_ratings(
            &user,
            &UserRatingQuery {
                parent_imdb_id: Some("tt0903747".to_string()),
                sort_by: UserRatingSort::Rating,
                direction: SortDirection::Descending,
                ..UserRatingQuery::default()
            },
        )
        .unwrap();
    let ids: Vec<&str> = episodes
        .items
        .iter()
        .map(|r| r.title.imdb_id.as_str())
        .collect();
    assert_eq!(ids, vec!["tt1232244", "tt0959621"]);
    let parent = episodes.items[0].parent_title.as_ref().unwrap();
    assert_eq!(parent.name.as_deref(), Some("Breaking Bad"));
    assert!(parent.children.is_empty());
}
