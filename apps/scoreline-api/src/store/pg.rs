//! PostgreSQL gateway. One pooled connection per transaction, with the
//! fixture row locked `FOR UPDATE` until commit or rollback.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Object;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};

use super::{ChatStore, MatchStore, MatchTx, StoreResult};
use crate::db::pool::DbPool;
use crate::db::schema::{
    balls, batter_innings, bowler_spells, chat_messages, conversation_participants, fixtures,
    incidents, innings, period_scores, players, standings, team_stats, wickets,
};
use crate::models::chat::ChatMessage;
use crate::models::cricket::{Ball, BatterInnings, BowlerSpell, Innings};
use crate::models::fixture::{Fixture, Player};
use crate::models::football::{Incident, PeriodScore, TeamStats};
use crate::models::standing::Standing;
use crate::models::Change;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn MatchTx>> {
        let mut conn = self.pool.get().await?;
        AnsiTransactionManager::begin_transaction(&mut *conn).await?;
        Ok(Box::new(PgTx { conn }))
    }
}

pub struct PgTx {
    conn: Object<AsyncPgConnection>,
}

#[async_trait]
impl MatchTx for PgTx {
    async fn lock_fixture(&mut self, match_id: &str) -> StoreResult<Option<Fixture>> {
        let fixture = fixtures::table
            .find(match_id)
            .select(Fixture::as_select())
            .for_update()
            .first(&mut *self.conn)
            .await
            .optional()?;
        Ok(fixture)
    }

    async fn fixture(&mut self, match_id: &str) -> StoreResult<Option<Fixture>> {
        let fixture = fixtures::table
            .find(match_id)
            .select(Fixture::as_select())
            .first(&mut *self.conn)
            .await
            .optional()?;
        Ok(fixture)
    }

    async fn players(&mut self, team_ids: &[String]) -> StoreResult<Vec<Player>> {
        let rows = players::table
            .filter(players::team_id.eq_any(team_ids))
            .select(Player::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn innings(&mut self, match_id: &str) -> StoreResult<Vec<Innings>> {
        let rows = innings::table
            .filter(innings::match_id.eq(match_id))
            .order(innings::number.asc())
            .select(Innings::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn batters(&mut self, match_id: &str) -> StoreResult<Vec<BatterInnings>> {
        let rows = batter_innings::table
            .filter(batter_innings::match_id.eq(match_id))
            .order((batter_innings::innings_id, batter_innings::position))
            .select(BatterInnings::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn bowlers(&mut self, match_id: &str) -> StoreResult<Vec<BowlerSpell>> {
        let rows = bowler_spells::table
            .filter(bowler_spells::match_id.eq(match_id))
            .select(BowlerSpell::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn last_ball(&mut self, innings_id: &str) -> StoreResult<Option<Ball>> {
        let ball = balls::table
            .filter(balls::innings_id.eq(innings_id))
            .order(balls::seq.desc())
            .select(Ball::as_select())
            .first(&mut *self.conn)
            .await
            .optional()?;
        Ok(ball)
    }

    async fn periods(&mut self, match_id: &str) -> StoreResult<Vec<PeriodScore>> {
        let rows = period_scores::table
            .filter(period_scores::match_id.eq(match_id))
            .select(PeriodScore::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn incidents(&mut self, match_id: &str) -> StoreResult<Vec<Incident>> {
        let rows = incidents::table
            .filter(incidents::match_id.eq(match_id))
            .order(incidents::id.asc())
            .select(Incident::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn stats(&mut self, match_id: &str) -> StoreResult<Vec<TeamStats>> {
        let rows = team_stats::table
            .filter(team_stats::match_id.eq(match_id))
            .select(TeamStats::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn standings(&mut self, tournament_id: &str) -> StoreResult<Vec<Standing>> {
        let rows = standings::table
            .filter(standings::tournament_id.eq(tournament_id))
            .select(Standing::as_select())
            .load(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    async fn apply(&mut self, change: &Change) -> StoreResult<()> {
        let conn = &mut *self.conn;
        match change {
            Change::Fixture(row) => {
                diesel::insert_into(fixtures::table)
                    .values(row)
                    .on_conflict(fixtures::id)
                    .do_update()
                    .set(row)
                    .execute(conn)
                    .await?;
            }
            Change::Innings(row) => {
                diesel::insert_into(innings::table)
                    .values(row)
                    .on_conflict(innings::id)
                    .do_update()
                    .set(row)
                    .execute(conn)
                    .await?;
            }
            Change::Batter(row) => {
                diesel::insert_into(batter_innings::table)
                    .values(row)
                    .on_conflict((batter_innings::innings_id, batter_innings::player_id))
                    .do_update()
                    .set(row)
                    .execute(conn)
                    .await?;
            }
            Change::Bowler(row) => {
                diesel::insert_into(bowler_spells::table)
                    .values(row)
                    .on_conflict((bowler_spells::innings_id, bowler_spells::player_id))
                    .do_update()
                    .set(row)
                    .execute(conn)
                    .await?;
            }
            Change::Ball(row) => {
                diesel::insert_into(balls::table)
                    .values(row)
                    .execute(conn)
                    .await?;
            }
            Change::Wicket(row) => {
                diesel::insert_into(wickets::table)
                    .values(row)
                    .execute(conn)
                    .await?;
            }
            Change::Period(row) => {
                diesel::insert_into(period_scores::table)
                    .values(row)
                    .on_conflict((
                        period_scores::match_id,
                        period_scores::team_id,
                        period_scores::period,
                    ))
                    .do_update()
                    .set(row)
                    .execute(conn)
                    .await?;
            }
            Change::Incident(row) => {
                diesel::insert_into(incidents::table)
                    .values(row)
                    .execute(conn)
                    .await?;
            }
            Change::Stats(row) => {
                diesel::insert_into(team_stats::table)
                    .values(row)
                    .on_conflict((team_stats::match_id, team_stats::team_id))
                    .do_update()
                    .set(row)
                    .execute(conn)
                    .await?;
            }
            Change::Standing(row) => {
                diesel::insert_into(standings::table)
                    .values(row)
                    .on_conflict((standings::tournament_id, standings::team_id))
                    .do_update()
                    .set(row)
                    .execute(conn)
                    .await?;
            }
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn).await?;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        AnsiTransactionManager::rollback_transaction(&mut *self.conn).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn is_participant(&self, conversation_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let found = diesel::select(diesel::dsl::exists(
            conversation_participants::table
                .filter(conversation_participants::conversation_id.eq(conversation_id))
                .filter(conversation_participants::user_id.eq(user_id)),
        ))
        .get_result::<bool>(&mut conn)
        .await?;
        Ok(found)
    }

    async fn insert_message(&self, message: &ChatMessage) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(chat_messages::table)
            .values(message)
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
