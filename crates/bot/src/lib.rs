pub mod commands;
pub mod delivery;
pub mod dispatch;
pub mod events;
pub mod outbound;
pub mod replies;
pub mod roles;
pub mod runner;

pub use commands::{parse_command, Command};
pub use delivery::{format_feedback, DeliveryEngine, DeliveryReport, RecipientSet};
pub use dispatch::{Disposition, RelayDispatcher, RelayPolicy};
pub use events::{ChatContext, ChatKind, InboundEvent, SenderProfile};
pub use outbound::{ChatSender, NoopChatSender, SendError};
pub use roles::{Role, RoleSet};
pub use runner::{NoopTransport, PollRunner, ReconnectPolicy, TransportError, UpdateTransport};
