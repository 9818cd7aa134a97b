use dropwire::commands::{CommandStatus, Dispatcher, ResultList, WorkspaceRoot};
use dropwire::prompt::PromptStore;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    prompts: Arc<PromptStore>,
    dispatcher: Dispatcher,
}

fn fixture() -> Fixture {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().join("project");
    fs::create_dir_all(&root).expect("project root");
    let rules_path = tmp.path().join("rules.txt");
    let prompt_path = tmp.path().join("system.txt");
    fs::write(&rules_path, "rules").expect("rules");
    fs::write(&prompt_path, "persona").expect("prompt");
    let prompts = Arc::new(PromptStore::open(&rules_path, &prompt_path).expect("open prompts"));
    let dispatcher = Dispatcher::new(WorkspaceRoot::new(root.clone()), Arc::clone(&prompts));
    Fixture {
        _tmp: tmp,
        root,
        prompts,
        dispatcher,
    }
}

fn run(fixture: &Fixture, raw: &str) -> ResultList {
    serde_json::from_str(&fixture.dispatcher.parse_and_execute(raw, true))
        .expect("result envelope")
}

#[test]
fn a_full_build_session_leaves_the_expected_tree() {
    let fixture = fixture();
    let envelope = run(
        &fixture,
        r#"{"commands":[
            {"functionName":"CreateDirectory","arguments":"{\"directoryPath\":\"Scenes/Main\"}"},
            {"functionName":"CreateFile","arguments":"{\"filePath\":\"Scenes/Main/level.json\",\"fileContent\":\"{}\"}"},
            {"functionName":"ReadFile","arguments":"{\"filePath\":\"Scenes/Main/level.json\"}"}
        ]}"#,
    );

    assert_eq!(envelope.results.len(), 3);
    assert!(envelope
        .results
        .iter()
        .all(|result| result.status == CommandStatus::Success));
    assert_eq!(envelope.results[2].file_content.as_deref(), Some("{}"));
    assert!(fixture.root.join("Scenes/Main/level.json").is_file());
}

#[test]
fn listing_puts_directories_before_files_and_hides_sidecars() {
    let fixture = fixture();
    fs::create_dir_all(fixture.root.join("assets/textures")).expect("mkdir");
    fs::write(fixture.root.join("assets/b.png"), "").expect("file");
    fs::write(fixture.root.join("assets/a.png"), "").expect("file");
    fs::write(fixture.root.join("assets/a.png.meta"), "").expect("sidecar");

    let envelope = run(
        &fixture,
        r#"{"commands":[{"functionName":"ListContents","arguments":"{\"directoryPath\":\"assets\"}"}]}"#,
    );
    let listing = envelope.results[0]
        .directory_listing
        .as_ref()
        .expect("listing payload");

    let names: Vec<&str> = listing
        .contents
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(names, vec!["textures", "a.png", "b.png"]);
}

#[test]
fn deleting_a_missing_path_fails_without_blocking_later_commands() {
    let fixture = fixture();
    let envelope = run(
        &fixture,
        r#"{"commands":[
            {"functionName":"DeletePath","arguments":"{\"pathToDelete\":\"ghost.txt\"}"},
            {"functionName":"CreateDirectory","arguments":"{\"directoryPath\":\"after\"}"}
        ]}"#,
    );

    assert_eq!(envelope.results[0].status, CommandStatus::Error);
    assert_eq!(envelope.results[1].status, CommandStatus::Success);
    assert!(fixture.root.join("after").is_dir());
}

#[test]
fn parent_traversal_is_rejected_before_touching_the_filesystem() {
    let fixture = fixture();
    let envelope = run(
        &fixture,
        r#"{"commands":[{"functionName":"ReadFile","arguments":"{\"filePath\":\"../outside.txt\"}"}]}"#,
    );
    assert_eq!(envelope.results[0].status, CommandStatus::Error);
    assert!(envelope.results[0].message.contains(".."));
}

#[test]
fn set_prompt_flows_from_the_wire_into_the_prompt_store() {
    let fixture = fixture();
    let envelope = run(
        &fixture,
        r#"{"commands":[{"functionName":"SetPrompt","arguments":"{\"promptContent\":\"you are a cartographer\"}"}]}"#,
    );
    assert_eq!(envelope.results[0].status, CommandStatus::Success);
    assert_eq!(fixture.prompts.prompt_content(), "you are a cartographer");
}
