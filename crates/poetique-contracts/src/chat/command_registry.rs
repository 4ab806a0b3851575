#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload",
    },
    CommandSpec {
        command: "open",
        action: "upload",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "new",
        action: "reset",
    },
    CommandSpec {
        command: "show",
        action: "show",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "wait",
        action: "wait",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const TOGGLE_COMMAND: CommandSpec = CommandSpec {
    command: "toggle",
    action: "toggle_answer",
};

pub(crate) const EXPORT_COMMAND: CommandSpec = CommandSpec {
    command: "export",
    action: "export",
};

pub(crate) const EXPORT_FORMATS: &[&str] = &["pdf", "html"];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/toggle <n>",
    "/show",
    "/status",
    "/wait",
    "/export [pdf|html]",
    "/reset",
    "/help",
    "/quit",
];
