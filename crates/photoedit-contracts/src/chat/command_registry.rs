#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "load",
        action: "load_image",
    },
    CommandSpec {
        command: "open",
        action: "load_image",
    },
    CommandSpec {
        command: "export",
        action: "export",
    },
    CommandSpec {
        command: "save",
        action: "export",
    },
];

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "preset",
        action: "apply_preset",
    },
    CommandSpec {
        command: "provider",
        action: "set_provider",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "reset",
        action: "reset_filters",
    },
    CommandSpec {
        command: "show",
        action: "show_state",
    },
    CommandSpec {
        command: "css",
        action: "show_css",
    },
    CommandSpec {
        command: "presets",
        action: "list_presets",
    },
    CommandSpec {
        command: "close",
        action: "close_image",
    },
    CommandSpec {
        command: "dismiss",
        action: "dismiss_notices",
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

pub(crate) const SET_CHANNEL_COMMAND: CommandSpec = CommandSpec {
    command: "set",
    action: "set_channel",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/load <path>",
    "/set <channel> <value>",
    "/preset <name>",
    "/presets",
    "/reset",
    "/show",
    "/css",
    "/export [dir]",
    "/provider <name>",
    "/close",
    "/dismiss",
    "/help",
    "/quit",
    "<instruction> (AI edit)",
];
