mod handler;
mod model;

pub use handler::{
    avatar_options,
    create_group,
    discover_groups,
    joined_groups,
    join_group,
    leave_group,
    open_group,
    search_groups,
};
