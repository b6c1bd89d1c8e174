// tests/plan_expansion.rs

use assetdag::build_plan;
use assetdag::tasks::{ExecPlan, TaskRegistry};
use assetdag_test_utils::ConfigFileBuilder;

fn registry() -> TaskRegistry {
    TaskRegistry::standard(&ConfigFileBuilder::new().build()).unwrap()
}

fn after(plan: &ExecPlan, id: &str) -> Vec<String> {
    let mut deps = plan.step(id).unwrap().after.clone();
    deps.sort();
    deps
}

#[test]
fn build_plan_shape() {
    let (plan, step_ids) = build_plan(&registry(), "build").unwrap();

    assert_eq!(
        plan.tasks(),
        vec!["clean", "build-scss", "build-js", "inject-header", "inject-footer"]
    );
    assert_eq!(plan.roots(), vec!["clean"]);
    assert_eq!(after(&plan, "build-scss"), vec!["clean"]);
    assert_eq!(after(&plan, "build-js"), vec!["clean"]);
    assert_eq!(after(&plan, "inject-header"), vec!["build-js", "build-scss"]);
    assert_eq!(after(&plan, "inject-footer"), vec!["inject-header"]);
    assert!(step_ids.is_empty());
}

#[test]
fn default_plan_shape() {
    let (plan, step_ids) = build_plan(&registry(), "default").unwrap();

    assert_eq!(plan.roots(), vec!["clean"]);
    assert_eq!(after(&plan, "inject-header"), vec!["js", "scss"]);
    assert_eq!(after(&plan, "svg-sprite"), vec!["inject-footer"]);
    assert_eq!(after(&plan, "watch"), vec!["svg-sprite"]);
    assert_eq!(after(&plan, "serve"), vec!["svg-sprite"]);
    assert!(plan.step("watch").unwrap().long_lived);
    assert!(plan.step("serve").unwrap().long_lived);

    // Watch targets are already part of the plan.
    assert_eq!(step_ids.get("scss").map(String::as_str), Some("scss"));
    assert_eq!(step_ids.get("svg-sprite").map(String::as_str), Some("svg-sprite"));
    assert!(plan.steps.iter().all(|s| !s.on_demand));
}

#[test]
fn watch_alone_gets_on_demand_targets() {
    let (plan, step_ids) = build_plan(&registry(), "watch").unwrap();

    assert_eq!(plan.roots(), vec!["watch"]);
    for target in ["scss", "js", "svg-sprite"] {
        let step = plan.step(target).unwrap();
        assert!(step.on_demand, "{target} should only run when triggered");
        assert!(step.after.is_empty());
        assert_eq!(step_ids[target], target);
    }
}

#[test]
fn custom_composition_expands_like_a_builtin() {
    let cfg = ConfigFileBuilder::new()
        .with_series("styles", &["clean", "build-scss", "inject-header"])
        .build();
    let registry = TaskRegistry::standard(&cfg).unwrap();
    let (plan, _) = build_plan(&registry, "styles").unwrap();

    assert_eq!(plan.tasks(), vec!["clean", "build-scss", "inject-header"]);
    assert_eq!(after(&plan, "inject-header"), vec!["build-scss"]);
}

#[test]
fn unknown_target_is_an_error() {
    let err = build_plan(&registry(), "deploy").unwrap_err();
    assert!(err.to_string().contains("deploy"));
}
