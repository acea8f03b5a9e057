use refscan_cli::{command, run};
use refscan_host::MemoryHost;
use refscan_test_utils::{clean_site, mixed_site};
use std::path::{Path, PathBuf};

fn write_dataset(dir: &Path, host: &MemoryHost) -> PathBuf {
    let path = dir.join("site.json");
    std::fs::write(&path, serde_json::to_vec(&host.dataset()).unwrap()).unwrap();
    path
}

async fn refscan(args: &[&str]) -> (anyhow::Result<()>, String) {
    let matches = command()
        .try_get_matches_from(std::iter::once("refscan").chain(args.iter().copied()))
        .unwrap();
    let mut out = Vec::new();
    let result = run(&matches, &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn find_broken_then_report() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), &mixed_site());
    let store = dir.path().join("store");
    let export = dir.path().join("export.json");

    let (result, out) = refscan(&[
        "--store",
        store.to_str().unwrap(),
        "fb",
        "--dataset",
        dataset.to_str().unwrap(),
        "--export",
        export.to_str().unwrap(),
    ])
    .await;
    result.unwrap();
    assert!(out.contains("All broken entity references have been processed."));
    assert!(out.contains("Processed 2 out of 2 entity types."));
    assert!(export.exists());

    let (result, out) = refscan(&["--store", store.to_str().unwrap(), "report"]).await;
    result.unwrap();
    assert!(out.starts_with("Total 4 of broken references between 4 different types."));
    assert!(out.contains("field_tags"));

    let (result, out) = refscan(&["--store", store.to_str().unwrap(), "report", "--json"]).await;
    result.unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["node"]["article"]["field_author"]["10"][0], 42);
}

#[tokio::test]
async fn sessions_do_not_share_reports() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), &mixed_site());
    let store = dir.path().to_str().unwrap();

    let (result, _) = refscan(&[
        "--store",
        store,
        "--session",
        "alice",
        "find-broken",
        "-d",
        dataset.to_str().unwrap(),
    ])
    .await;
    result.unwrap();

    let (result, out) = refscan(&["--store", store, "--session", "bob", "report"]).await;
    result.unwrap();
    assert_eq!(out.trim(), "No report built yet for session bob.");
}

#[tokio::test]
async fn estimate_before_and_after_scan() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), &mixed_site());
    let store = dir.path().to_str().unwrap();

    let (result, out) = refscan(&["--store", store, "estimate", "-d", dataset.to_str().unwrap()]).await;
    result.unwrap();
    assert_eq!(
        out.trim(),
        "At least 2 different types of broken references found. Build report to get full details."
    );

    refscan(&["--store", store, "fb", "-d", dataset.to_str().unwrap()])
        .await
        .0
        .unwrap();
    let (result, out) = refscan(&["--store", store, "estimate", "-d", dataset.to_str().unwrap()]).await;
    result.unwrap();
    assert_eq!(out.trim(), "Total 4 of broken references between 4 different types.");
}

#[tokio::test]
async fn clean_site_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), &clean_site());

    let (result, out) = refscan(&[
        "--store",
        dir.path().to_str().unwrap(),
        "estimate",
        "-d",
        dataset.to_str().unwrap(),
    ])
    .await;
    result.unwrap();
    assert!(out.starts_with("No broken entity references were found, good work!"));
}

#[tokio::test]
async fn map_honours_configured_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), &mixed_site());
    let config = dir.path().join("refscan.toml");
    std::fs::write(&config, r#"additional_exclusions = ["taxonomy_term.parent"]"#).unwrap();

    let (result, out) = refscan(&[
        "--config",
        config.to_str().unwrap(),
        "map",
        "-d",
        dataset.to_str().unwrap(),
    ])
    .await;
    result.unwrap();

    let map: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert!(map.get("node").is_some());
    assert!(map.get("taxonomy_term").is_none());
    assert!(map.get("comment").is_none());
}

#[tokio::test]
async fn missing_dataset_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    let (result, _) = refscan(&["map", "-d", missing.to_str().unwrap()]).await;
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("loading dataset"));
}

#[test]
fn dataset_is_required() {
    assert!(command()
        .try_get_matches_from(["refscan", "find-broken"])
        .is_err());
}
