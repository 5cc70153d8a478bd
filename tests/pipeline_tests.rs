//! Integration tests for the scan -> parse -> render -> export pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use copilot_chatlog::error::ChatlogError;
use copilot_chatlog::export::{FileSink, Sink};
use copilot_chatlog::extractors::{SESSIONS_DIR, WORKSPACE_METADATA};
use copilot_chatlog::formatters::{sanitize_text, Block, RawMode, RenderOptions};
use copilot_chatlog::parsers::{EditSummary, ParseOptions, Segment, VSCodeCopilotParser};
use copilot_chatlog::sort::{self, SortSpec};
use copilot_chatlog::{
    list_sessions, list_workspaces, load_session, parse_session, render, Session, SessionSummary,
};
use tempfile::TempDir;

/// Helper: get absolute path to a test fixture file.
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// Create `<root>/<id>/` with optional workspace.json and the given session files.
fn make_workspace(
    root: &Path,
    id: &str,
    folder: Option<&str>,
    sessions: &[(&str, &str)],
) -> PathBuf {
    let dir = root.join(id);
    fs::create_dir_all(dir.join(SESSIONS_DIR)).unwrap();
    if let Some(folder) = folder {
        fs::write(
            dir.join(WORKSPACE_METADATA),
            format!("{{\"folder\": \"{}\"}}", folder),
        )
        .unwrap();
    }
    for (name, content) in sessions {
        fs::write(dir.join(SESSIONS_DIR).join(name), content).unwrap();
    }
    dir
}

fn fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).unwrap()
}

fn parse_fixture(name: &str) -> Session {
    parse_session(&fixture_path(name), ParseOptions::default()).unwrap()
}

// ============================================================================
// Workspace scanning
// ============================================================================

mod scanning {
    use super::*;

    #[test]
    fn test_workspace_folder_and_last_update() {
        let temp = TempDir::new().unwrap();
        let dir = make_workspace(
            temp.path(),
            "a1b2c3",
            Some("file:///home/u/proj"),
            &[("s1.json", "{\"requests\": []}"), ("s2.json", "{\"requests\": []}")],
        );

        let t1 = at(1_700_000_000);
        let t2 = at(1_700_000_500);
        set_mtime(&dir.join(SESSIONS_DIR).join("s1.json"), t1);
        set_mtime(&dir.join(SESSIONS_DIR).join("s2.json"), t2);
        set_mtime(&dir.join(WORKSPACE_METADATA), at(1_600_000_000));

        let workspaces = list_workspaces(temp.path()).unwrap();
        assert_eq!(workspaces.len(), 1);

        let ws = &workspaces[0];
        assert_eq!(ws.id, "a1b2c3");
        assert_eq!(ws.folder.as_deref(), Some("/home/u/proj"));
        assert_eq!(ws.last_update, Some(DateTime::<Utc>::from(t2)));
        assert_eq!(ws.session_count(), 2);
    }

    #[test]
    fn test_directories_without_sessions_are_skipped() {
        let temp = TempDir::new().unwrap();
        make_workspace(temp.path(), "with-chat", None, &[]);
        fs::create_dir_all(temp.path().join("other-extension")).unwrap();
        fs::write(temp.path().join("stray.txt"), "x").unwrap();

        let workspaces = list_workspaces(temp.path()).unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].id, "with-chat");
        assert!(workspaces[0].folder.is_none());
        assert_eq!(workspaces[0].session_count(), 0);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = list_workspaces(&temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, ChatlogError::Io { .. }));
    }

    #[test]
    fn test_malformed_sibling_does_not_abort_listing() {
        let temp = TempDir::new().unwrap();
        make_workspace(
            temp.path(),
            "ws",
            None,
            &[
                ("good.json", &fixture("full_session.json")),
                ("broken.json", &fixture("not_json.json")),
                ("notes.jsonl", "{}\n"),
            ],
        );

        let workspaces = list_workspaces(temp.path()).unwrap();
        let (summaries, errors) = list_sessions(&VSCodeCopilotParser::default(), &workspaces[0]);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "good");
        assert_eq!(summaries[0].workspace_id.as_deref(), Some("ws"));
        assert_eq!(summaries[0].title.as_deref(), Some("Parsing TOML in Rust"));
        assert_eq!(summaries[0].turns, 3);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].0.ends_with("broken.json"));
        assert!(matches!(errors[0].1, ChatlogError::SessionParse { .. }));
    }
}

// ============================================================================
// Session parsing with fixture files
// ============================================================================

mod parsing {
    use super::*;

    #[test]
    fn test_full_session_metadata() {
        let session = parse_fixture("full_session.json");

        assert_eq!(session.id, "full_session");
        assert_eq!(session.title.as_deref(), Some("Parsing TOML in Rust"));
        assert_eq!(session.requester.as_deref(), Some("octocat"));
        assert_eq!(session.created.unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(session.last_update.unwrap().timestamp_millis(), 1_700_000_900_000);
        assert_eq!(session.len(), 3);
        assert_eq!(session.notes().count(), 0);
        assert_eq!(session.path.as_deref(), Some(fixture_path("full_session.json").as_path()));
    }

    #[test]
    fn test_full_session_segments() {
        let session = parse_fixture("full_session.json");

        let first = &session.turns[0];
        assert_eq!(first.model.as_deref(), Some("copilot/gpt-4o"));
        // Two text items, the symbol reference and the code block URI
        assert_eq!(first.response.len(), 4);
        assert!(matches!(
            &first.response[1],
            Segment::CodeRef { label: Some(label), .. } if label == "Config::load"
        ));
        assert!(matches!(&first.response[3], Segment::CodeRef { label: None, uri: Some(_), .. }));

        let second = &session.turns[1];
        assert_eq!(second.request, "Add a default for the “sanitize” field");
        let edit = second
            .response
            .iter()
            .find_map(|s| match s {
                Segment::FileRef { path, edits: Some(edits), .. } => Some((path.clone(), *edits)),
                _ => None,
            })
            .unwrap();
        assert_eq!(edit.0, "/home/u/proj/src/config.rs");
        assert_eq!(edit.1, EditSummary { edits: 2, added: 5, deleted: 1 });

        let third = &session.turns[2];
        assert!(third.canceled);
        assert_eq!(third.response, vec![Segment::Formatted("Sure, starting with".to_string())]);
    }

    #[test]
    fn test_malformed_turns_keep_their_siblings() {
        let session = parse_fixture("malformed_turns.json");

        assert_eq!(session.len(), 5);
        assert_eq!(session.notes().count(), 5);
        assert_eq!(session.turns[0].request, "");
        assert_eq!(session.turns[1].request, "A question without an answer");
        assert!(matches!(session.turns[2].response[0], Segment::Opaque { .. }));
        assert_eq!(
            session.turns[2].response[1],
            Segment::Formatted("The rest still renders.".to_string())
        );
        assert_eq!(session.turns[4].request, "Last");
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let err =
            parse_session(&fixture_path("not_json.json"), ParseOptions::default()).unwrap_err();
        match err {
            ChatlogError::SessionParse { path, .. } => assert!(path.ends_with("not_json.json")),
            other => panic!("expected SessionParse, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = parse_session(&fixture_path("absent.json"), ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ChatlogError::Io { .. }));
    }
}

// ============================================================================
// Rendering
// ============================================================================

mod rendering {
    use super::*;

    #[test]
    fn test_unknown_segment_gives_one_placeholder() {
        let session = parse_fixture("unknown_segment.json");
        let doc = render(&session, &RenderOptions::default());

        let placeholders: Vec<&str> = doc.placeholders().collect();
        assert_eq!(placeholders, vec!["[unsupported content: holographicDiagram]"]);
        assert!(doc.to_markdown().unwrap().contains("## Request 1"));
    }

    #[test]
    fn test_full_session_markdown() {
        let session = parse_fixture("full_session.json");
        let markdown = render(&session, &RenderOptions::default()).to_markdown().unwrap();

        assert!(markdown.starts_with("# Chat Session Details"));
        assert!(markdown.contains("**Title:** Parsing TOML in Rust"));
        assert!(markdown.contains("## Copilot Response 3 (canceled)"));
        assert!(markdown.contains("`Config::load` (/home/u/proj/src/config.rs:L40-L48)"));
        assert!(markdown.contains(
            "Edited file: `/home/u/proj/src/config.rs` (5 lines added, 1 lines deleted)"
        ));
        // Sanitized outside code, untouched inside the fence
        assert!(markdown.contains("Add a default for the \"sanitize\" field"));
        assert!(markdown.contains("&lt;b>serde&lt;/b>"));
        assert!(markdown.contains("let config: Config = toml::from_str(&content)?;"));
        assert!(!markdown.contains("Searching workspace"));
    }

    #[test]
    fn test_render_never_fails_on_malformed_turns() {
        let session = parse_fixture("malformed_turns.json");
        let options = RenderOptions {
            notes: true,
            ..RenderOptions::default()
        };
        let doc = render(&session, &options);

        let rules = doc.blocks.iter().filter(|b| **b == Block::Rule).count();
        assert_eq!(rules, 5);
        let notes = doc.blocks.iter().filter(|b| matches!(b, Block::Note(_))).count();
        assert_eq!(notes, 5);
        assert_eq!(doc.placeholders().count(), 1);
    }

    #[test]
    fn test_raw_mode_uses_retained_json() {
        let session = parse_session(
            &fixture_path("unknown_segment.json"),
            ParseOptions { retain_raw: true },
        )
        .unwrap();
        let options = RenderOptions {
            raw: RawMode::Turns,
            ..RenderOptions::default()
        };
        let markdown = render(&session, &options).to_markdown().unwrap();

        assert!(markdown.contains("## Request 1 (raw JSON input)"));
        assert!(markdown.contains("## Copilot Response 1 (raw JSON input)"));
        assert!(markdown.contains("\"holographicDiagram\""));
    }

    #[test]
    fn test_sanitize_is_deterministic() {
        let input = fixture("full_session.json");
        assert_eq!(sanitize_text(&input), sanitize_text(&input));
    }
}

// ============================================================================
// Sorting and identifier resolution over real listings
// ============================================================================

mod listing {
    use super::*;

    fn summaries() -> (TempDir, Vec<SessionSummary>) {
        let temp = TempDir::new().unwrap();
        let session = |title: &str, created: u64, turns: usize| {
            let requests: Vec<String> = (0..turns)
                .map(|i| format!("{{\"message\": {{\"text\": \"q{}\"}}, \"response\": []}}", i))
                .collect();
            format!(
                "{{\"customTitle\": \"{}\", \"creationDate\": {}, \"requests\": [{}]}}",
                title,
                created,
                requests.join(",")
            )
        };
        make_workspace(
            temp.path(),
            "ws",
            None,
            &[
                ("abc111.json", &session("beta", 3_000, 1)),
                ("abc222.json", &session("Alpha", 1_000, 2)),
                ("def333.json", &session("gamma", 2_000, 2)),
            ],
        );
        let workspaces = list_workspaces(temp.path()).unwrap();
        let (summaries, errors) = list_sessions(&VSCodeCopilotParser::default(), &workspaces[0]);
        assert!(errors.is_empty());
        (temp, summaries)
    }

    fn ids(items: &[SessionSummary]) -> Vec<&str> {
        items.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_sort_by_created_both_directions() {
        let (_temp, items) = summaries();
        let ascending = sort::sort(items.clone(), "created", false).unwrap();
        assert_eq!(ids(&ascending), vec!["abc222", "def333", "abc111"]);

        let descending = SortSpec::parse("-created").apply(items).unwrap();
        assert_eq!(ids(&descending), vec!["abc111", "def333", "abc222"]);
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let (_temp, items) = summaries();
        let input_order: Vec<String> = items
            .iter()
            .filter(|s| s.turns == 2)
            .map(|s| s.id.clone())
            .collect();

        let once = sort::sort(items, "turns", false).unwrap();
        let tied: Vec<String> = once
            .iter()
            .filter(|s| s.turns == 2)
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(tied, input_order);

        let twice = sort::sort(once.clone(), "turns", false).unwrap();
        assert_eq!(ids(&twice), ids(&once));
    }

    #[test]
    fn test_title_sort_ignores_case() {
        let (_temp, items) = summaries();
        let sorted = sort::sort(items, "title", false).unwrap();
        let titles: Vec<&str> = sorted.iter().filter_map(|s| s.title.as_deref()).collect();
        assert_eq!(titles, vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_unknown_sort_key() {
        let (_temp, items) = summaries();
        match sort::sort(items, "colour", false) {
            Err(ChatlogError::UnknownSortKey { key, valid, .. }) => {
                assert_eq!(key, "colour");
                assert!(valid.contains(&"updated"));
            }
            other => panic!("expected UnknownSortKey, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_resolve_prefixes() {
        let (_temp, items) = summaries();
        assert_eq!(sort::resolve(&items, "def").unwrap().id, "def333");
        assert_eq!(sort::resolve(&items, "ABC2...").unwrap().id, "abc222");
        assert!(matches!(
            sort::resolve(&items, "abc"),
            Err(ChatlogError::AmbiguousIdentifier { .. })
        ));
        assert!(matches!(
            sort::resolve(&items, "zzz"),
            Err(ChatlogError::IdentifierNotFound { .. })
        ));
    }

    #[test]
    fn test_load_session_counts_unparseable_files_as_candidates() {
        let temp = TempDir::new().unwrap();
        make_workspace(
            temp.path(),
            "ws",
            None,
            &[
                ("abc111.json", &fixture("not_json.json")),
                ("abc222.json", &fixture("unknown_segment.json")),
            ],
        );
        let workspaces = list_workspaces(temp.path()).unwrap();
        let workspace = &workspaces[0];

        assert!(matches!(
            load_session(workspace, "abc", ParseOptions::default()),
            Err(ChatlogError::AmbiguousIdentifier { .. })
        ));
        assert!(matches!(
            load_session(workspace, "abc1", ParseOptions::default()),
            Err(ChatlogError::SessionParse { .. })
        ));

        let session = load_session(workspace, "abc2", ParseOptions::default()).unwrap();
        assert_eq!(session.id, "abc222");
        assert_eq!(session.workspace_id.as_deref(), Some("ws"));
    }
}

// ============================================================================
// File export
// ============================================================================

mod export {
    use super::*;

    #[test]
    fn test_existing_destination_is_refused_then_replaced() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("chat.md");
        fs::write(&dest, "previous content that is longer than nothing").unwrap();

        let session = parse_fixture("unknown_segment.json");
        let doc = render(&session, &RenderOptions::default());

        let err = FileSink::new(&dest, false).write(&doc).unwrap_err();
        assert!(matches!(err, ChatlogError::DestinationExists { .. }));
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "previous content that is longer than nothing"
        );

        FileSink::new(&dest, true).write(&doc).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), doc.to_markdown().unwrap());
    }

    #[test]
    fn test_new_destination_is_created() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("new.md");

        let session = parse_fixture("full_session.json");
        let doc = render(&session, &RenderOptions::default());
        FileSink::new(&dest, false).write(&doc).unwrap();

        let written = fs::read_to_string(&dest).unwrap();
        assert!(written.starts_with("# Chat Session Details"));
    }
}
