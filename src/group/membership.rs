// 成员关系账本
// 创建、加入、退出群组时维护三份冗余数据：
// 群组成员数、群组成员列表、用户的已加入群组索引。
// 每一步都是单文档写入，失败时不回滚。

use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::geo::Location;
use crate::models::{Group, MAX_GROUP_NAME_LEN, MAX_NICKNAME_LEN, Membership, paths};
use crate::store::{DocumentStore, Fields, SetMode};
use crate::utils::avatar::{DEFAULT_STYLE, avatar_url};

/// 创建群组的参数
#[derive(Debug, Clone)]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub nickname: &'a str,
    pub avatar_style: Option<&'a str>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub group: Group,
    pub nickname: String,
    /// false 表示用户本来就是成员，计数没有变化
    pub newly_joined: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub was_member: bool,
    /// 是否执行了成员数减一
    pub decremented: bool,
}

/// 校验必填文本：去掉首尾空白后不能为空，且不超过最大字符数
pub fn required_text(value: &str, max_chars: usize, label: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("Please enter a {}.", label)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(AppError::validation(format!(
            "The {} must be at most {} characters.",
            label, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

/// 成员关系操作
pub struct MembershipLedger {
    store: Arc<dyn DocumentStore>,
}

impl MembershipLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 创建群组
    ///
    /// 顺序：群组文档（成员数为1）-> 创建者成员记录 -> 创建者的已加入索引。
    /// 第一步之后失败会留下没有成员的群组，不做回滚。
    pub async fn create_group(&self, user_id: &str, request: NewGroup<'_>) -> AppResult<Group> {
        let name = required_text(request.name, MAX_GROUP_NAME_LEN, "group name")?;
        let nickname = required_text(request.nickname, MAX_NICKNAME_LEN, "nickname")?;
        let coordinate = request
            .location
            .coordinate()
            .ok_or(AppError::LocationRequired)?;
        let avatar = avatar_url(&name, request.avatar_style.unwrap_or(DEFAULT_STYLE));

        let fields = Fields::new()
            .set("name", name.clone())
            .set("avatar", avatar.clone())
            .set("latitude", coordinate.latitude)
            .set("longitude", coordinate.longitude)
            .set("createdBy", user_id)
            .set("memberCount", 1)
            .set("lastMessage", "")
            .server_timestamp("createdAt")
            .server_timestamp("updatedAt");
        let group_id = self.store.add(&paths::groups(), fields).await.map_err(|e| {
            tracing::error!("Failed to create group {}: {}", name, e);
            e
        })?;

        let membership = Fields::new()
            .set("nickname", nickname)
            .server_timestamp("joinedAt");
        if let Err(e) = self
            .store
            .set(&paths::member(&group_id, user_id), membership, SetMode::Replace)
            .await
        {
            tracing::warn!("Group {} was created without members: {}", group_id, e);
            return Err(e.into());
        }

        if let Err(e) = self
            .write_joined_entry(user_id, &group_id, &name, &avatar)
            .await
        {
            tracing::warn!("Group {} is missing from the creator's index: {}", group_id, e);
            return Err(e);
        }

        tracing::info!("User {} created group {}: {}", user_id, group_id, name);
        Ok(Group {
            id: group_id,
            name,
            avatar_ref: avatar,
            latitude: Some(coordinate.latitude),
            longitude: Some(coordinate.longitude),
            member_count: 1,
            last_message: String::new(),
            updated_at: None,
            created_at: None,
            created_by: user_id.to_string(),
        })
    }

    /// 加入群组
    ///
    /// 已是成员时不重复写成员记录、不增加计数；已加入索引总是写入。
    pub async fn join_group(
        &self,
        user_id: &str,
        group_id: &str,
        nickname: &str,
    ) -> AppResult<JoinOutcome> {
        let nickname = required_text(nickname, MAX_NICKNAME_LEN, "nickname")?;
        let group = self.load_group(group_id).await?;

        let member_path = paths::member(group_id, user_id);
        let already_member = self.store.get(&member_path).await?.is_some();

        if !already_member {
            let membership = Fields::new()
                .set("nickname", nickname.clone())
                .server_timestamp("joinedAt");
            self.store
                .set(&member_path, membership, SetMode::Replace)
                .await?;
            self.store
                .increment(&paths::group(group_id), "memberCount", 1)
                .await?;
        } else {
            tracing::debug!("User {} is already a member of {}", user_id, group_id);
        }

        self.write_joined_entry(user_id, group_id, &group.name, &group.avatar_ref)
            .await?;

        tracing::info!("User {} joined group {}", user_id, group_id);
        Ok(JoinOutcome {
            group,
            nickname,
            newly_joined: !already_member,
        })
    }

    /// 退出群组
    ///
    /// 先读取当前成员数，只有大于0时才减一。读取与减一之间存在竞争窗口，
    /// 由此产生的计数偏差不做修正。
    pub async fn leave_group(&self, user_id: &str, group_id: &str) -> AppResult<LeaveOutcome> {
        let group_path = paths::group(group_id);
        let count_before = match self.store.get(&group_path).await? {
            Some(doc) => doc.decode::<Group>()?.member_count,
            None => 0,
        };

        let member_path = paths::member(group_id, user_id);
        let was_member = self.store.get(&member_path).await?.is_some();

        self.store.delete(&member_path).await?;
        self.store
            .delete(&paths::joined_group(user_id, group_id))
            .await?;

        let decremented = was_member && count_before > 0;
        if decremented {
            self.store.increment(&group_path, "memberCount", -1).await?;
        } else if was_member {
            tracing::warn!("Member count of {} is already zero, skipping decrement", group_id);
        }

        tracing::info!("User {} left group {}", user_id, group_id);
        Ok(LeaveOutcome {
            was_member,
            decremented,
        })
    }

    /// 查询用户在群组中的昵称
    pub async fn membership(&self, group_id: &str, user_id: &str) -> AppResult<Option<Membership>> {
        match self.store.get(&paths::member(group_id, user_id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// 用户昵称，非成员或读取不到时为 "Anonymous"
    pub async fn nickname(&self, group_id: &str, user_id: &str) -> AppResult<String> {
        let membership = self.membership(group_id, user_id).await?;
        Ok(membership
            .as_ref()
            .map_or("Anonymous", Membership::display_name)
            .to_string())
    }

    /// 要求用户是群组成员
    ///
    /// 群组不存在时返回 NotFound，存在但不是成员时返回 Forbidden。
    pub async fn require_member(&self, group_id: &str, user_id: &str) -> AppResult<Membership> {
        if let Some(membership) = self.membership(group_id, user_id).await? {
            return Ok(membership);
        }
        self.load_group(group_id).await?;
        Err(AppError::Forbidden(format!(
            "You are not a member of group {}.",
            group_id
        )))
    }

    async fn load_group(&self, group_id: &str) -> AppResult<Group> {
        self.store
            .get(&paths::group(group_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {}", group_id)))?
            .decode()
            .map_err(AppError::from)
    }

    /// 写入已加入索引，合并写入以保留已有的 lastSeen
    async fn write_joined_entry(
        &self,
        user_id: &str,
        group_id: &str,
        name: &str,
        avatar: &str,
    ) -> AppResult<()> {
        let entry = Fields::new()
            .set("groupId", group_id)
            .set("name", name)
            .set("avatar", avatar)
            .server_timestamp("joinedAt");
        self.store
            .set(&paths::joined_group(user_id, group_id), entry, SetMode::Merge)
            .await?;
        Ok(())
    }
}
