use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{AccountRecord, BadgeKey, BadgeSet, DatasetMetadata};
use time::UtcDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct DatasetRow {
    pub(crate) identity: String,
    pub(crate) display_name: String,
    pub(crate) byte_size: i64,
    pub(crate) ingested_at: i64,
    pub(crate) account_count: i64,
}
impl TryFrom<&DatasetMetadata> for DatasetRow {
    type Error = Error;
    fn try_from(metadata: &DatasetMetadata) -> Result<Self, Self::Error> {
        Ok(Self {
            identity: metadata.identity.to_string(),
            display_name: metadata.display_name.clone(),
            byte_size: i64::try_from(metadata.byte_size).or_raise(|| ErrorKind::InvalidData("byte size"))?,
            ingested_at: metadata.ingested_at.unix_timestamp(),
            account_count: i64::try_from(metadata.account_count)
                .or_raise(|| ErrorKind::InvalidData("account count"))?,
        })
    }
}
impl TryFrom<DatasetRow> for DatasetMetadata {
    type Error = Error;
    fn try_from(row: DatasetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            identity: row.identity.parse::<DatasetIdentity>().or_raise(|| ErrorKind::InvalidData("identity"))?,
            display_name: row.display_name,
            byte_size: u64::try_from(row.byte_size).or_raise(|| ErrorKind::InvalidData("byte size"))?,
            ingested_at: UtcDateTime::from_unix_timestamp(row.ingested_at)
                .or_raise(|| ErrorKind::InvalidData("ingestion date"))?,
            account_count: u64::try_from(row.account_count).or_raise(|| ErrorKind::InvalidData("account count"))?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub(crate) idx: i64,
    pub(crate) username: String,
    pub(crate) badges: i64,
}
impl TryFrom<&AccountRecord> for AccountRow {
    type Error = Error;
    fn try_from(record: &AccountRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            idx: i64::try_from(record.index).or_raise(|| ErrorKind::InvalidData("account index"))?,
            username: record.username.clone(),
            badges: i64::from(record.badges.bits()),
        })
    }
}
impl TryFrom<AccountRow> for AccountRecord {
    type Error = Error;
    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let bits = u16::try_from(row.badges).or_raise(|| ErrorKind::InvalidData("badges"))?;
        Ok(Self {
            index: usize::try_from(row.idx).or_raise(|| ErrorKind::InvalidData("account index"))?,
            username: row.username,
            badges: BadgeSet::from_bits_truncate(bits),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BadgeStatRow {
    pub(crate) badge: String,
    pub(crate) count: i64,
}
impl TryFrom<BadgeStatRow> for (BadgeKey, u64) {
    type Error = Error;
    fn try_from(row: BadgeStatRow) -> Result<Self, Self::Error> {
        Ok((
            row.badge.parse::<BadgeKey>().or_raise(|| ErrorKind::InvalidData("badge"))?,
            u64::try_from(row.count).or_raise(|| ErrorKind::InvalidData("badge count"))?,
        ))
    }
}
