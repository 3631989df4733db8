// 会话模块
// 消息流、未读计数、输入状态、会话内搜索，以及把它们绑在一起的会话作用域

mod composer;
mod scroll;
mod search;
mod session;
mod stream;
mod typing;
mod unread;

pub use composer::Composer;
pub use scroll::{NEAR_BOTTOM_PX, ScrollPolicy, Viewport};
pub use search::{ConversationSearch, Segment, highlight, occurrences};
pub use session::{ChatSession, SessionEvent};
pub use stream::{FeedUpdate, MessageFeed, MessageService};
pub use typing::{TypingFeed, TypingPublisher, TypingRegistry, typing_label, typing_others};
pub use unread::{UnreadTracker, unread_count};
