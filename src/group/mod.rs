// 群组模块
// 发现、搜索、成员关系以及“我的群组”列表

mod directory;
mod joined;
mod membership;
mod search;

pub use directory::{DirectoryEntry, DirectoryView, GroupDirectory};
pub use joined::{JoinedGroupSummary, JoinedGroups, JoinedGroupsWatcher};
pub use membership::{JoinOutcome, LeaveOutcome, MembershipLedger, NewGroup, required_text};
pub use search::{DEFAULT_RESULT_LIMIT, GlobalSearch, SearchHit, SearchSections};
