use super::helpers::*;
use crate::{handle_lookup, parse_min_score, StoreError, DEFAULT_MIN_SCORE};
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn threshold_filters_and_orders_by_score() -> Result<()> {
    let dir = tempdir()?;
    let store = open_built(dir.path(), SAMPLE)?;

    assert_eq!(pairs(&store.query("A", 0.6)?), vec![("T3", 0.8)]);
    assert_eq!(pairs(&store.query("A", 0.0)?), vec![("T1", 0.5), ("T3", 0.8)]);
    assert_eq!(pairs(&store.query("B", 0.0)?), vec![("T2", 0.9)]);
    Ok(())
}

#[test]
fn threshold_is_strict() -> Result<()> {
    let dir = tempdir()?;
    let store = open_built(dir.path(), "A,zero,0\nA,half,0.5\nA,neg,-1\n")?;

    assert!(store.query("A", 0.5)?.is_empty());
    assert_eq!(pairs(&store.query("A", DEFAULT_MIN_SCORE)?), vec![("half", 0.5)]);
    assert_eq!(
        pairs(&store.query("A", -1.0)?),
        vec![("zero", 0.0), ("half", 0.5)]
    );
    Ok(())
}

#[test]
fn unknown_key_yields_empty_result() -> Result<()> {
    let dir = tempdir()?;
    let store = open_built(dir.path(), SAMPLE)?;
    assert!(store.query("C", 0.0)?.is_empty());
    assert!(store.query("", 0.0)?.is_empty());
    assert!(store.query("a", 0.0)?.is_empty());
    Ok(())
}

#[test]
fn infinite_thresholds() -> Result<()> {
    let dir = tempdir()?;
    let store = open_built(dir.path(), SAMPLE)?;
    assert!(store.query("A", f64::INFINITY)?.is_empty());
    assert_eq!(store.query("A", f64::NEG_INFINITY)?.len(), 2);
    Ok(())
}

#[test]
fn nan_threshold_behaves_like_default() -> Result<()> {
    let dir = tempdir()?;
    let store = open_built(dir.path(), "A,zero,0\nA,one,1\n")?;
    assert_eq!(store.query("A", f64::NAN)?, store.query("A", DEFAULT_MIN_SCORE)?);
    assert_eq!(pairs(&store.query("A", f64::NAN)?), vec![("one", 1.0)]);
    Ok(())
}

#[test]
fn equal_scores_keep_input_order() -> Result<()> {
    let dir = tempdir()?;
    let input = "K,first,0.5\nJ,other,0.1\nK,second,0.5\nK,top,0.9\nK,third,0.5\n";
    // Tiny chunks force the tie to be resolved by the merge, not the chunk sort.
    let (opts, _) = build_with(dir.path(), input, 1, 2)?;
    let store = crate::Store::open(&opts.sorted, &opts.index)?;

    assert_eq!(
        pairs(&store.query("K", 0.0)?),
        vec![("first", 0.5), ("second", 0.5), ("third", 0.5), ("top", 0.9)]
    );
    Ok(())
}

#[test]
fn handle_lookup_parses_raw_thresholds() -> Result<()> {
    let dir = tempdir()?;
    let store = open_built(dir.path(), SAMPLE)?;

    assert_eq!(pairs(&handle_lookup(&store, "A", Some("0.6"))?), vec![("T3", 0.8)]);
    assert_eq!(handle_lookup(&store, "A", None)?.len(), 2);
    assert_eq!(handle_lookup(&store, "A", Some("garbage"))?.len(), 2);
    assert!(handle_lookup(&store, "A", Some("inf"))?.is_empty());
    Ok(())
}

#[test]
fn parse_min_score_policy() {
    assert_eq!(parse_min_score(None), 0.0);
    assert_eq!(parse_min_score(Some("")), 0.0);
    assert_eq!(parse_min_score(Some("  ")), 0.0);
    assert_eq!(parse_min_score(Some("abc")), 0.0);
    assert_eq!(parse_min_score(Some("NaN")), 0.0);
    assert_eq!(parse_min_score(Some("0.25")), 0.25);
    assert_eq!(parse_min_score(Some(" -3 ")), -3.0);
    assert_eq!(parse_min_score(Some("1e2")), 100.0);
    assert_eq!(parse_min_score(Some("inf")), f64::INFINITY);
}

#[test]
fn concurrent_queries_agree() -> Result<()> {
    let dir = tempdir()?;
    let store = open_built(dir.path(), &generated_input(1000, 50))?;
    let keys: Vec<String> = store.keys().map(str::to_string).collect();

    let expected = keys
        .iter()
        .map(|k| store.query(k, 0.3))
        .collect::<Result<Vec<_>, StoreError>>()?;

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    keys.iter()
                        .map(|k| store.query(k, 0.3))
                        .collect::<Result<Vec<_>, StoreError>>()
                })
            })
            .collect();
        for h in handles {
            let got = h.join().expect("query thread panicked").expect("query failed");
            assert_eq!(got, expected);
        }
    });
    Ok(())
}

#[test]
fn foreign_key_inside_range_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let (opts, _) = build_with(dir.path(), SAMPLE, 10, 2)?;

    // Same length, so the index still tiles the file.
    let text = fs::read_to_string(&opts.sorted)?;
    fs::write(&opts.sorted, text.replace("B,T2,0.9", "C,T2,0.9"))?;

    let store = crate::Store::open(&opts.sorted, &opts.index)?;
    assert!(matches!(store.query("B", 0.0), Err(StoreError::Corrupt { .. })));
    // Other keys are unaffected.
    assert_eq!(store.query("A", 0.0)?.len(), 2);
    Ok(())
}

#[test]
fn unparsable_record_inside_range_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let (opts, _) = build_with(dir.path(), SAMPLE, 10, 2)?;

    let text = fs::read_to_string(&opts.sorted)?;
    fs::write(&opts.sorted, text.replace("A,T3,0.8", "A,T3,x.8"))?;

    let store = crate::Store::open(&opts.sorted, &opts.index)?;
    assert!(matches!(store.query("A", 0.0), Err(StoreError::Corrupt { .. })));
    Ok(())
}
