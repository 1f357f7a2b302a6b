//! TokenHolderAgent: per-agent attributes and the monthly sell/stake/hold
//! decision protocol.

use std::collections::VecDeque;

use tracing::debug;

use crate::market_state::MarketState;
use crate::vesting::VestingSchedule;

const PRICE_HISTORY_CAPACITY: usize = 12;

/// Static, cohort-sampled behavioral parameters for one agent.
#[derive(Debug, Clone)]
pub struct AgentAttributes {
    pub agent_id: String,
    pub cohort: String,
    pub risk_tolerance: f64,
    pub hold_time_preference: f64,
    pub price_sensitivity: f64,
    pub staking_propensity: f64,
    pub allocation_tokens: f64,
    pub sell_pressure_base: f64,
    pub cliff_shock_multiplier: f64,
    pub take_profit_threshold: f64,
    pub stop_loss_threshold: f64,
    pub scaling_weight: f64,
}

/// One agent's decision for a tick.
#[derive(Debug, Clone, Copy)]
pub struct AgentAction {
    pub sell_tokens: f64,
    pub stake_tokens: f64,
    pub hold_tokens: f64,
    pub scaling_weight: f64,
}

impl AgentAction {
    /// The action substituted when an agent's decision fails; preserves the
    /// agent's scaling weight so aggregation still accounts for it.
    pub fn zero(scaling_weight: f64) -> Self {
        Self {
            sell_tokens: 0.0,
            stake_tokens: 0.0,
            hold_tokens: 0.0,
            scaling_weight,
        }
    }
}

pub struct Agent {
    pub attrs: AgentAttributes,
    vesting: VestingSchedule,
    locked_balance: f64,
    unlocked_balance: f64,
    staked_balance: f64,
    sold_cumulative: f64,
    price_history: VecDeque<f64>,
    initial_price: Option<f64>,
}

impl Agent {
    pub fn new(attrs: AgentAttributes, vesting: VestingSchedule) -> Self {
        let locked_balance = attrs.allocation_tokens;
        Self {
            attrs,
            vesting,
            locked_balance,
            unlocked_balance: 0.0,
            staked_balance: 0.0,
            sold_cumulative: 0.0,
            price_history: VecDeque::with_capacity(PRICE_HISTORY_CAPACITY),
            initial_price: None,
        }
    }

    pub fn unlocked_balance(&self) -> f64 {
        self.unlocked_balance
    }

    pub fn staked_balance(&self) -> f64 {
        self.staked_balance
    }

    pub fn sold_cumulative(&self) -> f64 {
        self.sold_cumulative
    }

    /// Run one tick of agent behavior against the current market state.
    /// Total: never panics, never returns an error; an agent with no
    /// meaningful decision to make (e.g. zero unlocked balance) simply emits
    /// a zero-valued hold action.
    pub fn execute(&mut self, market: &MarketState) -> AgentAction {
        let newly_unlocked = self.vesting.advance_month();
        self.unlocked_balance += newly_unlocked;
        self.locked_balance = self.vesting.remaining_locked();

        let current_price = market.price;
        if self.price_history.len() == PRICE_HISTORY_CAPACITY {
            self.price_history.pop_front();
        }
        self.price_history.push_back(current_price);
        if self.initial_price.is_none() {
            self.initial_price = Some(current_price);
        }

        let sell_amount = self.decide_sell_amount(current_price, newly_unlocked);
        let stake_amount = self.decide_stake_amount(self.unlocked_balance - sell_amount);

        self.unlocked_balance -= sell_amount + stake_amount;
        self.staked_balance += stake_amount;
        self.sold_cumulative += sell_amount;

        debug!(
            agent_id = %self.attrs.agent_id,
            sell_amount, stake_amount,
            "agent tick"
        );

        AgentAction {
            sell_tokens: sell_amount,
            stake_tokens: stake_amount,
            hold_tokens: self.unlocked_balance,
            scaling_weight: self.attrs.scaling_weight,
        }
    }

    fn decide_sell_amount(&self, current_price: f64, newly_unlocked: f64) -> f64 {
        let base = newly_unlocked * self.attrs.sell_pressure_base;
        let price_factor = self.price_trigger_factor(current_price);
        let cliff_factor = self.cliff_factor();
        let risk_mod = (1.0 + (self.attrs.risk_tolerance - 0.5) * 0.5).clamp(0.5, 1.5);
        let sell = base * price_factor * cliff_factor * risk_mod;
        sell.clamp(0.0, self.unlocked_balance)
    }

    fn price_trigger_factor(&self, current_price: f64) -> f64 {
        let Some(initial) = self.initial_price.filter(|p| *p != 0.0) else {
            return 1.0;
        };
        let change_pct = (current_price - initial) / initial;

        if change_pct > self.attrs.take_profit_threshold {
            1.0 + 0.2 * self.attrs.price_sensitivity
        } else if change_pct < self.attrs.stop_loss_threshold {
            1.0 + 0.3 * self.attrs.price_sensitivity
        } else {
            1.0
        }
    }

    fn cliff_factor(&self) -> f64 {
        if self.vesting.is_cliff_month() {
            self.attrs.cliff_shock_multiplier
        } else {
            1.0
        }
    }

    fn decide_stake_amount(&self, available_balance: f64) -> f64 {
        (available_balance * self.attrs.staking_propensity).max(0.0)
    }
}
