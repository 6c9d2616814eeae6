use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        auth::Session,
        fields::lenient_string,
        store::{Coll, Document, Id, Record},
    },
};

/// Who created a record, and which political user's campaign it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    #[serde(default, deserialize_with = "lenient_string")]
    pub creator_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub admin_id: String,
}

impl Ownership {
    pub fn new(creator_id: &str, admin_id: &str) -> Self {
        Self {
            creator_id: creator_id.to_string(),
            admin_id: admin_id.to_string(),
        }
    }

    /// Records are visible to their creator and to the campaign owner.
    pub fn visible_to(&self, uid: &str) -> bool {
        !uid.is_empty() && (self.creator_id == uid || self.admin_id == uid)
    }

    /// Only the creator may change or delete a record.
    pub fn check_creator(&self, session: &Session) -> Result<()> {
        if !session.uid().is_empty() && self.creator_id == session.uid() {
            Ok(())
        } else {
            Err(Error::forbidden("Only the creator of a record may change it"))
        }
    }
}

/// A record carrying [`Ownership`].
pub trait Owned {
    fn ownership(&self) -> &Ownership;
}

/// What a record is called in error messages.
pub trait Named {
    const NAME: &'static str;
}

/// Every record of `coll` visible to the caller.
pub async fn find_visible<T>(coll: &Coll<T>, session: &Session) -> Result<Vec<Record<T>>>
where
    T: Document + Owned,
{
    let uid = session.uid().to_string();
    coll.find(session, move |r| r.ownership().visible_to(&uid)).await
}

/// A record visible to the caller. Invisible records are reported as absent.
pub async fn find_visible_one<T>(coll: &Coll<T>, session: &Session, id: &Id) -> Result<Record<T>>
where
    T: Document + Owned + Named,
{
    coll.find_one(session, id)
        .await?
        .filter(|r| r.ownership().visible_to(session.uid()))
        .ok_or_else(|| Error::not_found(format!("{} {id}", T::NAME)))
}

/// A record the caller may change.
pub async fn find_editable<T>(coll: &Coll<T>, session: &Session, id: &Id) -> Result<Record<T>>
where
    T: Document + Owned + Named,
{
    let record = find_visible_one(coll, session, id).await?;
    record.ownership().check_creator(session)?;
    Ok(record)
}
