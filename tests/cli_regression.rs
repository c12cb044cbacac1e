// Regression tests for the `keel` binary over the JSON fixtures.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn keel() -> Command {
    Command::cargo_bin("keel").unwrap()
}

#[test]
fn ast_prints_the_unexpanded_term() {
    keel()
        .args(["ast", "tests/fixtures/match_q.json"])
        .assert()
        .success()
        .stdout(contains("match?({:ok, x}, {:ok, 1})"));
}

#[test]
fn expand_prints_the_lowered_case() {
    keel()
        .args(["expand", "tests/fixtures/match_q.json"])
        .assert()
        .success()
        .stdout(contains("case {:ok, 1} do").and(contains("-> true; _ -> false end")));
}

#[test]
fn trace_lists_each_step() {
    keel()
        .args(["trace", "tests/fixtures/match_q.json"])
        .assert()
        .success()
        .stdout(
            contains("Step 0: match? (core)")
                .and(contains("-match?({:ok, x}, {:ok, 1})"))
                .and(contains("+case {:ok, 1} do {:ok, _x#")),
        );
}

#[test]
fn eval_prints_the_value() {
    keel()
        .args(["eval", "tests/fixtures/match_q.json"])
        .assert()
        .success()
        .stdout(contains("true"));

    keel()
        .args(["eval", "tests/fixtures/record.json"])
        .assert()
        .success()
        .stdout(contains("{User, nil, 25}"));
}

#[test]
fn module_flag_enables_delegation() {
    keel()
        .args(["eval", "--module", "Enum", "tests/fixtures/delegate.json"])
        .assert()
        .success()
        .stdout(contains("[3, 2, 1]"));

    keel()
        .args(["expand", "tests/fixtures/delegate.json"])
        .assert()
        .failure()
        .stderr(contains("keel::expansion").and(contains("defdelegate")));
}

#[test]
fn runtime_raises_are_reported_with_their_kind() {
    keel()
        .args(["eval", "tests/fixtures/cond_no_clause.json"])
        .assert()
        .failure()
        .stderr(contains("keel::raise").and(contains("cond_clause")));
}

#[test]
fn expansion_errors_carry_help() {
    keel()
        .args(["expand", "tests/fixtures/cond_wildcard.json"])
        .assert()
        .failure()
        .stderr(contains("unbound variable _ inside cond").and(contains("true")));
}

#[test]
fn cli_reports_miette_diagnostics_on_bad_input() {
    keel()
        .args(["expand", "tests/fixtures/malformed.json"])
        .assert()
        .failure()
        .stderr(contains("keel::input"));

    keel()
        .args(["expand", "tests/fixtures/missing.json"])
        .assert()
        .failure()
        .stderr(contains("cannot read"));
}

#[test]
fn max_depth_flag_bounds_expansion() {
    keel()
        .args(["expand", "--max-depth", "0", "tests/fixtures/match_q.json"])
        .assert()
        .failure()
        .stderr(contains("recursion limit (0)"));
}
