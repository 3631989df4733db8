// 会话作用域
// 打开会话时获取消息订阅、输入状态订阅和发布者；关闭或丢弃时全部释放

use std::sync::Arc;
use std::time::Duration;

use super::{
    Composer, ConversationSearch, FeedUpdate, MessageFeed, MessageService, ScrollPolicy,
    TypingFeed, TypingPublisher, Viewport,
};
use crate::error::AppResult;
use crate::group::MembershipLedger;
use crate::models::{Message, TypingState};
use crate::store::{DocumentStore, Subscription};

/// 会话中的一次变化
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Messages(FeedUpdate),
    Typing(Vec<TypingState>),
}

/// 一个打开的群组会话
pub struct ChatSession {
    group_id: String,
    user_id: String,
    nickname: String,
    service: MessageService,
    messages: Subscription,
    typing_feed: TypingFeed,
    publisher: Option<TypingPublisher>,
    feed: MessageFeed,
    typing: Vec<TypingState>,
    search: ConversationSearch,
    composer: Composer,
    scroll: ScrollPolicy,
}

impl ChatSession {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        group_id: &str,
        user_id: &str,
        typing_idle: Duration,
    ) -> AppResult<Self> {
        let nickname = MembershipLedger::new(store.clone())
            .nickname(group_id, user_id)
            .await?;
        let service = MessageService::new(store.clone());
        let messages = service.subscribe(group_id).await?;
        let typing_feed = TypingFeed::subscribe(&store, group_id, user_id).await?;
        let publisher = TypingPublisher::new(store, group_id, user_id, &nickname, typing_idle);

        tracing::debug!("User {} opened conversation {}", user_id, group_id);
        Ok(Self {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            nickname,
            service,
            messages,
            typing_feed,
            publisher: Some(publisher),
            feed: MessageFeed::new(),
            typing: Vec::new(),
            search: ConversationSearch::new(),
            composer: Composer::new(),
            scroll: ScrollPolicy::default(),
        })
    }

    /// 等待消息或输入状态的下一次变化，订阅结束时返回 None
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            snapshot = self.messages.next() => {
                let update = self.feed.apply(&snapshot?);
                self.search.refresh(self.feed.messages());
                Some(SessionEvent::Messages(update))
            }
            typing = self.typing_feed.next() => {
                self.typing = typing?;
                Some(SessionEvent::Typing(self.typing.clone()))
            }
        }
    }

    /// 输入框内容变化
    pub async fn input(&mut self, text: &str) -> AppResult<()> {
        self.composer.set_draft(text);
        match self.publisher.as_mut() {
            Some(publisher) => publisher.on_input(text).await,
            None => Ok(()),
        }
    }

    /// 发送输入框中的内容，失败时输入框恢复原文
    pub async fn send(&mut self) -> AppResult<Option<String>> {
        let sent = self
            .composer
            .submit(&self.service, &self.group_id, &self.user_id, &self.nickname)
            .await?;
        if sent.is_some() {
            if let Some(publisher) = self.publisher.as_mut() {
                publisher.on_input("").await?;
            }
        }
        Ok(sent)
    }

    pub async fn delete(&self, message_id: &str) -> AppResult<()> {
        self.service
            .delete(&self.group_id, message_id, &self.user_id)
            .await
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.search.set_query(query, self.feed.messages());
    }

    pub fn search(&self) -> &ConversationSearch {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut ConversationSearch {
        &mut self.search
    }

    /// 应用消息更新前的滚动状态决定是否滚到底部
    pub fn should_scroll(&self, before: &Viewport, update: &FeedUpdate) -> bool {
        self.scroll
            .should_scroll(before, update, &self.user_id, self.search.is_active())
    }

    pub fn messages(&self) -> &[Message] {
        self.feed.messages()
    }

    pub fn typing(&self) -> &[TypingState] {
        &self.typing
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// 离开会话：发布 false，取消计时器，释放全部订阅
    pub async fn close(mut self) -> AppResult<()> {
        if let Some(publisher) = self.publisher.take() {
            publisher.close().await?;
        }
        tracing::debug!("User {} closed conversation {}", self.user_id, self.group_id);
        Ok(())
    }
}
