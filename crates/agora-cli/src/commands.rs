//! Subcommands. Every command prints one JSON document on stdout.

use agora_core::{
  ids::{ChannelId, PostId, ReplyId, UserId, VoteId},
  reply::NewReply,
  store::{Page, ReplyTree, VoteLedger},
  vote::{HistoryFilter, TargetKind, VoteTarget, VoteType},
};
use agora_store_sqlite::SqliteStore;
use anyhow::Context as _;
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};

// ─── Arguments ───────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Register users.
  #[command(subcommand)]
  User(UserCommand),
  /// Register and delete posts.
  #[command(subcommand)]
  Post(PostCommand),
  /// Write, read and navigate replies.
  #[command(subcommand)]
  Reply(ReplyCommand),
  /// Cast and inspect votes.
  #[command(subcommand)]
  Vote(VoteCommand),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  Add { username: String },
}

#[derive(Subcommand, Debug)]
pub enum PostCommand {
  Add {
    #[arg(long)]
    channel: i64,
    #[arg(long)]
    author:  i64,
  },
  Delete { post: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ReplyCommand {
  Create {
    #[arg(long)]
    post:    i64,
    #[arg(long)]
    author:  i64,
    #[arg(long)]
    parent:  Option<i64>,
    content: String,
  },
  Update { reply: i64, content: String },
  /// Soft-delete one or more replies.
  Delete {
    #[arg(required = true)]
    replies: Vec<i64>,
  },
  Get { reply: i64 },
  /// The reply with its depth, edit flag and vote counts.
  View { reply: i64 },
  Stats { reply: i64 },
  List {
    post:     i64,
    /// Pre-order thread layout instead of plain chronological order.
    #[arg(long)]
    threaded: bool,
    #[command(flatten)]
    page:     PageArgs,
  },
  Count { post: i64 },
  Thread { reply: i64 },
  Ancestors { reply: i64 },
  Descendants { reply: i64 },
  Siblings { reply: i64 },
  IsAncestor { ancestor: i64, of: i64 },
  Children {
    reply: i64,
    #[command(flatten)]
    page:  PageArgs,
  },
  Search {
    post: i64,
    term: String,
    #[command(flatten)]
    page: PageArgs,
  },
  ByAuthor {
    author: i64,
    #[command(flatten)]
    page:   PageArgs,
  },
  Recent {
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
}

#[derive(Subcommand, Debug)]
pub enum VoteCommand {
  /// Toggle a vote: repeat to withdraw, flip to switch.
  Cast {
    voter:     i64,
    #[command(flatten)]
    target:    TargetArgs,
    #[arg(value_parser = VoteType::parse)]
    vote_type: VoteType,
  },
  Counts {
    #[command(flatten)]
    target: TargetArgs,
  },
  Of {
    voter:  i64,
    #[command(flatten)]
    target: TargetArgs,
  },
  /// All votes on a target, oldest first.
  List {
    #[command(flatten)]
    target: TargetArgs,
    #[command(flatten)]
    page:   PageArgs,
  },
  History {
    voter:  i64,
    #[arg(long, default_value = "all", value_parser = HistoryFilter::parse)]
    filter: HistoryFilter,
    #[command(flatten)]
    page:   PageArgs,
  },
  Retract { vote: i64 },
  Purge { voter: i64 },
  Top {
    kind:  TargetKind,
    /// Only rank replies on this post.
    #[arg(long)]
    post:  Option<i64>,
    /// Only rank targets voted on within the last this many hours.
    #[arg(long)]
    hours: Option<u32>,
    #[arg(long, default_value_t = 10)]
    limit: usize,
  },
  Controversial {
    #[arg(long, default_value_t = 5)]
    min_total: u64,
    #[arg(long, default_value_t = 10)]
    limit:     usize,
  },
  /// Totals across every vote.
  Stats,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
  #[arg(long, default_value_t = 0)]
  skip:  usize,
  #[arg(long, default_value_t = Page::DEFAULT_LIMIT)]
  limit: usize,
}

impl From<PageArgs> for Page {
  fn from(args: PageArgs) -> Self { Page::new(args.skip, args.limit) }
}

#[derive(Args, Debug, Clone, Copy)]
pub struct TargetArgs {
  /// `post` or `reply`.
  kind: TargetKind,
  id:   i64,
}

impl From<TargetArgs> for VoteTarget {
  fn from(args: TargetArgs) -> Self {
    match args.kind {
      TargetKind::Post => VoteTarget::Post(PostId(args.id)),
      TargetKind::Reply => VoteTarget::Reply(ReplyId(args.id)),
    }
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

pub async fn run(store: &SqliteStore, command: Command) -> anyhow::Result<()> {
  let output = match command {
    Command::User(cmd) => user(store, cmd).await?,
    Command::Post(cmd) => post(store, cmd).await?,
    Command::Reply(cmd) => reply(store, cmd).await?,
    Command::Vote(cmd) => vote(store, cmd).await?,
  };
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

fn to_json(value: impl Serialize) -> anyhow::Result<Value> {
  serde_json::to_value(value).context("failed to serialise output")
}

async fn user(store: &SqliteStore, cmd: UserCommand) -> anyhow::Result<Value> {
  match cmd {
    UserCommand::Add { username } => {
      let id = store
        .register_user(username)
        .await
        .context("failed to register user")?;
      Ok(json!({ "user_id": id }))
    }
  }
}

async fn post(store: &SqliteStore, cmd: PostCommand) -> anyhow::Result<Value> {
  match cmd {
    PostCommand::Add { channel, author } => {
      let id = store
        .register_post(ChannelId(channel), UserId(author))
        .await
        .context("failed to register post")?;
      Ok(json!({ "post_id": id }))
    }
    PostCommand::Delete { post } => {
      store
        .soft_delete_post(PostId(post))
        .await
        .context("failed to delete post")?;
      Ok(json!({ "deleted": post }))
    }
  }
}

async fn reply(store: &SqliteStore, cmd: ReplyCommand) -> anyhow::Result<Value> {
  match cmd {
    ReplyCommand::Create {
      post,
      author,
      parent,
      content,
    } => {
      let mut input = NewReply::new(PostId(post), UserId(author), content);
      if let Some(parent) = parent {
        input = input.under(ReplyId(parent));
      }
      to_json(store.create_reply(input).await.context("failed to create reply")?)
    }
    ReplyCommand::Update { reply, content } => to_json(
      store
        .update_reply(ReplyId(reply), content)
        .await
        .context("failed to update reply")?,
    ),
    ReplyCommand::Delete { replies } => {
      if let [single] = replies[..] {
        store
          .soft_delete_reply(ReplyId(single))
          .await
          .context("failed to delete reply")?;
        Ok(json!({ "deleted": 1 }))
      } else {
        let ids = replies.into_iter().map(ReplyId).collect();
        let deleted = store
          .bulk_soft_delete(ids)
          .await
          .context("failed to delete replies")?;
        Ok(json!({ "deleted": deleted }))
      }
    }
    ReplyCommand::Get { reply } => to_json(store.get_reply(ReplyId(reply)).await?),
    ReplyCommand::View { reply } => to_json(store.view_reply(ReplyId(reply)).await?),
    ReplyCommand::Stats { reply } => to_json(store.reply_stats(ReplyId(reply)).await?),
    ReplyCommand::List {
      post,
      threaded,
      page,
    } => to_json(
      store
        .list_replies(PostId(post), page.into(), threaded)
        .await?,
    ),
    ReplyCommand::Count { post } => {
      let count = store.count_replies(PostId(post)).await?;
      Ok(json!({ "post_id": post, "replies": count }))
    }
    ReplyCommand::Thread { reply } => to_json(store.thread_of(ReplyId(reply)).await?),
    ReplyCommand::Ancestors { reply } => to_json(store.ancestors(ReplyId(reply)).await?),
    ReplyCommand::Descendants { reply } => to_json(store.descendants(ReplyId(reply)).await?),
    ReplyCommand::Siblings { reply } => to_json(store.siblings(ReplyId(reply)).await?),
    ReplyCommand::IsAncestor { ancestor, of } => {
      let answer = store.is_ancestor_of(ReplyId(ancestor), ReplyId(of)).await?;
      Ok(json!({ "ancestor": ancestor, "of": of, "is_ancestor": answer }))
    }
    ReplyCommand::Children { reply, page } => {
      to_json(store.children(ReplyId(reply), page.into()).await?)
    }
    ReplyCommand::Search { post, term, page } => {
      to_json(store.search_replies(PostId(post), &term, page.into()).await?)
    }
    ReplyCommand::ByAuthor { author, page } => {
      to_json(store.replies_by_author(UserId(author), page.into()).await?)
    }
    ReplyCommand::Recent { limit } => to_json(store.recent_replies(limit).await?),
  }
}

async fn vote(store: &SqliteStore, cmd: VoteCommand) -> anyhow::Result<Value> {
  match cmd {
    VoteCommand::Cast {
      voter,
      target,
      vote_type,
    } => to_json(
      store
        .cast_vote(UserId(voter), target.into(), vote_type)
        .await
        .context("failed to cast vote")?,
    ),
    VoteCommand::Counts { target } => to_json(store.vote_counts(target.into()).await?),
    VoteCommand::Of { voter, target } => {
      to_json(store.vote_of(UserId(voter), target.into()).await?)
    }
    VoteCommand::List { target, page } => {
      to_json(store.votes_for(target.into(), page.into()).await?)
    }
    VoteCommand::History {
      voter,
      filter,
      page,
    } => to_json(
      store
        .vote_history(UserId(voter), filter, page.into())
        .await?,
    ),
    VoteCommand::Retract { vote } => {
      let removed = store.retract_vote(VoteId(vote)).await?;
      Ok(json!({ "vote_id": vote, "removed": removed }))
    }
    VoteCommand::Purge { voter } => {
      let removed = store.purge_voter(UserId(voter)).await?;
      Ok(json!({ "voter_id": voter, "removed": removed }))
    }
    VoteCommand::Top {
      kind,
      post,
      hours,
      limit,
    } => {
      let since = hours.map(|h| Utc::now() - Duration::hours(i64::from(h)));
      to_json(
        store
          .top_voted(kind, post.map(PostId), since, limit)
          .await?,
      )
    }
    VoteCommand::Controversial { min_total, limit } => {
      to_json(store.controversial(min_total, limit).await?)
    }
    VoteCommand::Stats => to_json(store.voting_stats().await?),
  }
}
