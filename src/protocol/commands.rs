//! Request command names understood by the server.

pub const AUTO_COMPLETE: &str = "/autocomplete";
pub const CHANGE_BUFFER: &str = "/changebuffer";
pub const CHECK_ALIVE_STATUS: &str = "/checkalivestatus";
pub const CHECK_READY_STATUS: &str = "/checkreadystatus";
pub const CODE_CHECK: &str = "/codecheck";
pub const DEBUG_TEST_GET_START_INFO: &str = "/v2/debugtest/getstartinfo";
pub const FILES_CHANGED: &str = "/filesChanged";
pub const FIND_IMPLEMENTATIONS: &str = "/findimplementations";
pub const FIND_SYMBOLS: &str = "/findsymbols";
pub const FIND_USAGES: &str = "/findusages";
pub const FORMAT_AFTER_KEYSTROKE: &str = "/formatAfterKeystroke";
pub const FORMAT_RANGE: &str = "/formatRange";
pub const GET_CODE_ACTIONS: &str = "/v2/getcodeactions";
pub const GO_TO_DEFINITION: &str = "/gotoDefinition";
pub const PROJECT: &str = "/project";
pub const PROJECTS: &str = "/projects";
pub const RUN_CODE_ACTION: &str = "/v2/runcodeaction";
pub const RUN_TEST: &str = "/v2/runtest";
pub const RUN_TESTS_IN_CLASS: &str = "/v2/runtestsinclass";
pub const SIGNATURE_HELP: &str = "/signatureHelp";
pub const TYPE_LOOKUP: &str = "/typelookup";
pub const UPDATE_BUFFER: &str = "/updatebuffer";

/// Fast interactive edits that must never wait behind other work.
pub const PRIORITY_COMMANDS: &[&str] = &[
    CHANGE_BUFFER,
    FORMAT_AFTER_KEYSTROKE,
    FORMAT_RANGE,
    UPDATE_BUFFER,
];

/// Expensive whole-project operations.
pub const DEFERRED_COMMANDS: &[&str] = &[
    CODE_CHECK,
    DEBUG_TEST_GET_START_INFO,
    FIND_IMPLEMENTATIONS,
    PROJECT,
    PROJECTS,
    RUN_TEST,
    RUN_TESTS_IN_CLASS,
];
