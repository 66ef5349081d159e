use crate::commands::{author, category, favorites, post, profile, vote};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "post",
            groups: post::EXAMPLES,
        },
        CommandExample {
            name: "category",
            groups: category::EXAMPLES,
        },
        CommandExample {
            name: "author",
            groups: author::EXAMPLES,
        },
        CommandExample {
            name: "vote",
            groups: vote::EXAMPLES,
        },
        CommandExample {
            name: "favorites",
            groups: favorites::EXAMPLES,
        },
        CommandExample {
            name: "profile",
            groups: profile::EXAMPLES,
        },
    ]
}
