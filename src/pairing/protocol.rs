//! Link/unlink/identify commands.
//!
//! Every command acts on the chat that issued it. User-input mistakes are
//! answered in the chat and never touch the store. Partner notifications
//! are best-effort: a partner that never talked to the bot simply misses
//! the notice, the pairing itself stands.

use std::sync::Arc;

use crate::messenger::{Notice, Outbox, TextFormat};
use crate::observability::{ObserverEvent, ObserverMetric};
use crate::pairing::store::PairingStore;
use crate::telegram::{BotCommand, ChatId};

/// A pairing command issued by a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingCommand {
    /// `/start` or `/help`: greeting with id and pairing status.
    Start,
    /// `/myid`
    Identify,
    /// `/link <id>`. The raw argument is validated by the protocol.
    Link { target: Option<String> },
    /// `/unlink`
    Unlink,
}

impl PairingCommand {
    /// Map a parsed bot command onto a pairing command. Unknown names are `None`.
    pub fn from_bot_command(command: &BotCommand) -> Option<Self> {
        match command.name.as_str() {
            "start" | "help" => Some(Self::Start),
            "myid" => Some(Self::Identify),
            "link" => Some(Self::Link {
                target: command.arg().map(str::to_string),
            }),
            "unlink" => Some(Self::Unlink),
            _ => None,
        }
    }
}

/// Why a `/link` argument was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    MissingArgument,
    NotNumeric,
    SelfLink,
}

impl LinkError {
    /// Reply shown to the user.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::MissingArgument => "Provide an ID: /link 123456789",
            Self::NotNumeric => "ID must be numeric. Example: /link 123456789",
            Self::SelfLink => "You can't link with yourself 🙂",
        }
    }
}

/// Validate a `/link` argument issued by `own`.
pub fn parse_link_target(arg: Option<&str>, own: ChatId) -> Result<ChatId, LinkError> {
    let raw = arg.map(str::trim).filter(|s| !s.is_empty());
    let target = raw
        .ok_or(LinkError::MissingArgument)?
        .parse::<ChatId>()
        .map_err(|_| LinkError::NotNumeric)?;
    if target == own {
        return Err(LinkError::SelfLink);
    }
    Ok(target)
}

pub(crate) fn help_text(chat: ChatId) -> String {
    format!(
        "I link two accounts and relay messages between them.\n\n\
         Your ID: <code>{chat}</code>\n\
         Commands:\n\
         /myid - show your ID\n\
         /link &lt;ID&gt; - link with another account (paste its ID)\n\
         /unlink - dissolve the link\n\n\
         Example: <code>/link 123456789</code>\n\
         Tip: send this ID to the other account, it runs /link {chat} and you are linked.\n"
    )
}

/// Handles pairing commands against a shared [`PairingStore`].
#[derive(Clone)]
pub struct PairingProtocol {
    store: Arc<PairingStore>,
    outbox: Outbox,
}

impl PairingProtocol {
    pub fn new(store: Arc<PairingStore>, outbox: Outbox) -> Self {
        Self { store, outbox }
    }

    /// Execute `command` on behalf of `chat` and send the replies.
    pub async fn handle(&self, chat: ChatId, command: PairingCommand) {
        match command {
            PairingCommand::Start => self.start(chat).await,
            PairingCommand::Identify => {
                self.outbox
                    .reply(chat, &format!("Your ID: <code>{chat}</code>"), TextFormat::Html)
                    .await;
            }
            PairingCommand::Link { target } => self.link(chat, target.as_deref()).await,
            PairingCommand::Unlink => self.unlink(chat).await,
        }
    }

    async fn start(&self, chat: ChatId) {
        let mut text = format!("👋 Hi! I'm a relay bot.\n\n{}", help_text(chat));
        match self.store.get_partner(chat).await {
            Some(partner) => text.push_str(&format!(
                "\n✅ Already linked with: <code>{partner}</code>\n\
                 Write any message and I'll pass it to your partner."
            )),
            None => text.push_str("\nNo link yet. Run /link &lt;ID&gt; to get going."),
        }
        self.outbox.reply(chat, &text, TextFormat::Html).await;
    }

    async fn link(&self, chat: ChatId, arg: Option<&str>) {
        let target = match parse_link_target(arg, chat) {
            Ok(target) => target,
            Err(e) => {
                self.outbox
                    .reply(chat, e.user_message(), TextFormat::Plain)
                    .await;
                return;
            }
        };

        let linked = match self.store.set_pair(chat, target).await {
            Ok(linked) => linked,
            Err(e) => {
                tracing::warn!(chat_id = chat, target, error = %e, "Link rejected by store");
                self.outbox
                    .reply(chat, "Could not save the link, try again later.", TextFormat::Plain)
                    .await;
                return;
            }
        };

        tracing::info!(chat_id = chat, target, displaced = ?linked.displaced, "Chats linked");
        let observer = self.outbox.observer();
        observer.record_event(&ObserverEvent::PairLinked { a: chat, b: target });
        observer.record_metric(&ObserverMetric::ActivePairs(
            self.store.pair_count().await as u64,
        ));

        let mut notices = vec![Notice::html(
            target,
            format!(
                "🔗 You have been linked with account <code>{chat}</code>.\n\
                 Messages will now be relayed automatically."
            ),
        )];
        notices.extend(linked.displaced.into_iter().map(|former| {
            Notice::plain(
                former,
                "❌ Your link was replaced by a new one. Messages are no longer relayed.",
            )
        }));

        let confirmation = format!(
            "Done! 🔗 Linked with <code>{target}</code>.\n\
             Write any message and I'll pass it to your partner.\n\
             To cancel: /unlink"
        );
        self.outbox
            .reply_with_notices(chat, &confirmation, TextFormat::Html, notices)
            .await;
    }

    async fn unlink(&self, chat: ChatId) {
        let Some(partner) = self.store.unlink(chat).await else {
            self.outbox
                .reply(chat, "There was no link.", TextFormat::Plain)
                .await;
            return;
        };

        tracing::info!(chat_id = chat, partner, "Chats unlinked");
        let observer = self.outbox.observer();
        observer.record_event(&ObserverEvent::PairUnlinked {
            a: chat,
            b: partner,
        });
        observer.record_metric(&ObserverMetric::ActivePairs(
            self.store.pair_count().await as u64,
        ));

        self.outbox
            .reply_with_notices(
                chat,
                "Link removed.",
                TextFormat::Plain,
                vec![Notice::plain(partner, "❌ Your partner dissolved the link.")],
            )
            .await;
    }
}
