//! Time-ordered 64 bit document ids.
//!
//! From the most significant bit: 42 bits of milliseconds since the epoch,
//! 5 bits worker id, 5 bits process id and a 12 bit increment. Comparing two
//! snowflakes therefore compares their creation times first, and ids minted
//! by one [`SnowflakeGenerator`] never compare equal or go backwards.

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_OFFSET: u32 = 17;
pub const PROCESS_ID_OFFSET: u32 = 12;
pub const NODE_PART_LENGTH: u32 = 5;
pub const INCREMENT_LENGTH: u32 = 12;

const TIMESTAMP_MAX: u64 = (1 << TIMESTAMP_LENGTH) - 1;
const INCREMENT_MAX: u16 = (1 << INCREMENT_LENGTH) - 1;
const NODE_PART_MASK: u64 = (1 << NODE_PART_LENGTH) - 1;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

macro_rules! node_part {
    ($name:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
        pub struct $name(u8);

        impl $name {
            #[must_use]
            pub fn new(id: u8) -> Option<Self> {
                (u64::from(id) <= NODE_PART_MASK).then_some(Self(id))
            }

            #[must_use]
            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = u8::deserialize(deserializer)?;
                Self::new(inner).ok_or_else(|| {
                    Error::invalid_value(Unexpected::Unsigned(inner.into()), &stringify!($name))
                })
            }
        }
    };
}

node_part!(WorkerId);
node_part!(ProcessId);

fn millis_since_epoch<SnowflakeEpoch: Epoch>(
    time: UtcDateTime,
) -> Result<u64, SnowflakeTimestampError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeTimestampError::TimeBeforeEpoch);
    }

    u64::try_from(millis)
        .ok()
        .filter(|millis| *millis <= TIMESTAMP_MAX)
        .ok_or(SnowflakeTimestampError::TimestampTooLarge)
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(
        timestamp_millis: u64,
        worker_id: WorkerId,
        process_id: ProcessId,
        increment: u16,
    ) -> Self {
        debug_assert!(timestamp_millis <= TIMESTAMP_MAX);
        debug_assert!(increment <= INCREMENT_MAX);

        Self::new(
            (timestamp_millis << TIMESTAMP_OFFSET)
                | (u64::from(worker_id.get()) << WORKER_ID_OFFSET)
                | (u64::from(process_id.get()) << PROCESS_ID_OFFSET)
                | u64::from(increment),
        )
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp_millis(self) -> u64 {
        self.0 >> TIMESTAMP_OFFSET
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        #[allow(clippy::cast_possible_truncation)]
        WorkerId(((self.0 >> WORKER_ID_OFFSET) & NODE_PART_MASK) as u8)
    }

    #[must_use]
    pub fn process_id(self) -> ProcessId {
        #[allow(clippy::cast_possible_truncation)]
        ProcessId(((self.0 >> PROCESS_ID_OFFSET) & NODE_PART_MASK) as u8)
    }

    #[must_use]
    pub fn increment(self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let increment = (self.0 & u64::from(INCREMENT_MAX)) as u16;
        increment
    }

    /// Creation time encoded in the id, at millisecond precision.
    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.timestamp_millis() as i64;
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(millis)
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    last: Option<(u64, u16)>,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            last: None,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(self) -> ProcessId {
        self.process_id
    }

    /// Mints an id for `time`.
    ///
    /// If `time` is not later than the previously minted id (same millisecond,
    /// or a clock that stepped backwards), the previous timestamp is reused
    /// with the next increment. An exhausted increment borrows the following
    /// millisecond.
    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError>
    where
        SnowflakeEpoch: Epoch,
    {
        let requested = millis_since_epoch::<SnowflakeEpoch>(time)?;

        let (timestamp, increment) = match self.last {
            Some((last_timestamp, last_increment)) if requested <= last_timestamp => {
                if last_increment == INCREMENT_MAX {
                    if last_timestamp == TIMESTAMP_MAX {
                        return Err(SnowflakeTimestampError::TimestampTooLarge);
                    }
                    (last_timestamp + 1, 0)
                } else {
                    (last_timestamp, last_increment + 1)
                }
            }
            _ => (requested, 0),
        };
        self.last = Some((timestamp, increment));

        Ok(Snowflake::from_parts(
            timestamp,
            self.worker_id,
            self.process_id,
            increment,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimestampError, WorkerId,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-01-01 00:00);
    }

    fn node() -> (WorkerId, ProcessId) {
        (WorkerId::new(3).unwrap(), ProcessId::new(7).unwrap())
    }

    #[test]
    fn node_part_ranges() {
        for legal in [0, 0xD, 0x1F] {
            assert!(WorkerId::new(legal).is_some());
            assert!(ProcessId::new(legal).is_some());
        }
        for illegal in [0x20, 0xF0, u8::MAX] {
            assert!(WorkerId::new(illegal).is_none());
            assert!(ProcessId::new(illegal).is_none());
        }
    }

    #[test]
    fn parts_round_trip() {
        let (worker_id, process_id) = node();
        let snowflake = Snowflake::<MillennialEpoch>::from_parts(1, worker_id, process_id, 100);

        assert_eq!(snowflake.get(), (1 << 22) | (3 << 17) | (7 << 12) | 100);
        assert_eq!(snowflake.timestamp_millis(), 1);
        assert_eq!(snowflake.worker_id(), worker_id);
        assert_eq!(snowflake.process_id(), process_id);
        assert_eq!(snowflake.increment(), 100);
    }

    #[test]
    fn created_at_matches_generation_time() {
        let (worker_id, process_id) = node();
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(worker_id, process_id);
        let time = utc_datetime!(2025-10-24 10:55:12.345);

        let snowflake = generator.generate_at(time).unwrap();
        assert_eq!(snowflake.created_at(), time);
    }

    #[test]
    fn rejects_times_outside_the_epoch_range() {
        let (worker_id, process_id) = node();
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(worker_id, process_id);

        assert_eq!(
            generator.generate_at(MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)),
            Err(SnowflakeTimestampError::TimeBeforeEpoch)
        );
        assert_eq!(
            generator
                .generate_at(MillennialEpoch::EPOCH_TIME + Duration::milliseconds(1 << 42)),
            Err(SnowflakeTimestampError::TimestampTooLarge)
        );
    }

    #[test]
    fn generator_is_strictly_increasing() {
        let (worker_id, process_id) = node();
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(worker_id, process_id);
        let time = utc_datetime!(2025-10-24 10:55);

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();
        let after_clock_step_back = generator
            .generate_at(time - Duration::seconds(5))
            .unwrap();
        let later = generator.generate_at(time + Duration::seconds(1)).unwrap();

        assert!(first < second);
        assert!(second < after_clock_step_back);
        assert!(after_clock_step_back < later);
        assert_eq!(second.increment(), 1);
        assert_eq!(after_clock_step_back.created_at(), time);
        assert_eq!(later.increment(), 0);
    }

    #[test]
    fn exhausted_increment_borrows_next_millisecond() {
        let (worker_id, process_id) = node();
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(worker_id, process_id);
        let time = utc_datetime!(2025-10-24 10:55);

        let mut previous = generator.generate_at(time).unwrap();
        for _ in 0..0x1000 {
            let next = generator.generate_at(time).unwrap();
            assert!(previous < next);
            previous = next;
        }

        assert_eq!(previous.created_at(), time + Duration::milliseconds(1));
        assert_eq!(previous.increment(), 0);
    }
}
