//! Contacts: wholesale replacement on sync, and phone-number resolution by
//! trailing-digit suffix.

use rusqlite::{params, OptionalExtension};

use localmighty_shared::constants::CONTACT_MATCH_DIGITS;
use localmighty_shared::types::{now_millis, Contact, ContactStats};

use crate::database::{collect_rows, contains_pattern, Database};
use crate::error::{not_found, Result, StoreError};

/// Matching key of a phone number: its last 9 digits, ignoring any
/// formatting or country-code prefix. Returns `None` when the number has no
/// digits at all.
pub fn phone_suffix(number: &str) -> Option<String> {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let start = digits.len().saturating_sub(CONTACT_MATCH_DIGITS);
    Some(digits[start..].iter().collect())
}

fn digits_only(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

impl Database {
    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Replace every stored contact with `contacts`, in one transaction.
    ///
    /// After this returns `Ok`, the store holds exactly the given contacts.
    /// Phone numbers keep their order; duplicates within a contact collapse.
    /// Returns the number of distinct contacts stored.
    pub fn replace_contacts(&mut self, contacts: &[Contact]) -> Result<usize> {
        let now = now_millis();
        let tx = self.conn_mut().transaction()?;

        tx.execute("DELETE FROM contact_phones", [])?;
        tx.execute("DELETE FROM contacts", [])?;

        {
            let mut insert_contact = tx.prepare(
                "INSERT INTO contacts (id, name, synced_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )?;
            let mut insert_phone = tx.prepare(
                "INSERT OR IGNORE INTO contact_phones (contact_id, phone_number, phone_digits, position)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for contact in contacts {
                insert_contact.execute(params![contact.id, contact.name, now])?;
                for (position, number) in contact.phone_numbers.iter().enumerate() {
                    insert_phone.execute(params![
                        contact.id,
                        number,
                        digits_only(number),
                        position as i64,
                    ])?;
                }
            }
        }

        let stored: i64 = tx.query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
        tx.commit()?;
        Ok(stored as usize)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All contacts ordered by name.
    pub fn list_contacts(&self) -> Result<Vec<Contact>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, name FROM contacts ORDER BY name ASC, id ASC")?;
        let heads = collect_rows(stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?)?;
        self.attach_phones(heads)
    }

    /// Contacts whose name or one of whose numbers contains `query`.
    /// Queries shorter than two characters return nothing.
    pub fn search_contacts(&self, query: &str) -> Result<Vec<Contact>> {
        if query.chars().count() < 2 {
            return Ok(Vec::new());
        }
        let pattern = contains_pattern(query);

        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT c.id, c.name
             FROM contacts c
             LEFT JOIN contact_phones cp ON cp.contact_id = c.id
             WHERE c.name LIKE ?1 ESCAPE '\\' OR cp.phone_number LIKE ?1 ESCAPE '\\'
             ORDER BY c.name ASC
             LIMIT 20",
        )?;
        let heads =
            collect_rows(stmt.query_map(params![pattern], |row| Ok((row.get(0)?, row.get(1)?)))?)?;
        self.attach_phones(heads)
    }

    /// The first contact owning a number whose digits end with the last
    /// 9 digits of `number`.
    pub fn contact_by_phone(&self, number: &str) -> Result<Option<Contact>> {
        let Some(suffix) = phone_suffix(number) else {
            return Ok(None);
        };

        let head: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT c.id, c.name
                 FROM contacts c
                 JOIN contact_phones cp ON cp.contact_id = c.id
                 WHERE cp.phone_digits LIKE '%' || ?1
                 ORDER BY cp.id ASC
                 LIMIT 1",
                params![suffix],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match head {
            Some(head) => Ok(self.attach_phones(vec![head])?.pop()),
            None => Ok(None),
        }
    }

    /// Resolve a display name for `number`, if any stored contact matches.
    pub fn find_contact_name(&self, number: &str) -> Result<Option<String>> {
        let Some(suffix) = phone_suffix(number) else {
            return Ok(None);
        };

        self.conn()
            .query_row(
                "SELECT c.name
                 FROM contacts c
                 JOIN contact_phones cp ON cp.contact_id = c.id
                 WHERE cp.phone_digits LIKE '%' || ?1
                 ORDER BY cp.id ASC
                 LIMIT 1",
                params![suffix],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_contact(&self, id: &str) -> Result<Contact> {
        let head: (String, String) = self
            .conn()
            .query_row(
                "SELECT id, name FROM contacts WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(not_found)?;
        self.attach_phones(vec![head])?
            .pop()
            .ok_or(StoreError::NotFound)
    }

    pub fn contact_stats(&self) -> Result<ContactStats> {
        self.conn()
            .query_row(
                "SELECT (SELECT COUNT(*) FROM contacts), (SELECT COUNT(*) FROM contact_phones)",
                [],
                |row| {
                    Ok(ContactStats {
                        total_contacts: row.get(0)?,
                        total_phone_numbers: row.get(1)?,
                    })
                },
            )
            .map_err(Into::into)
    }

    fn attach_phones(&self, heads: Vec<(String, String)>) -> Result<Vec<Contact>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT phone_number FROM contact_phones WHERE contact_id = ?1 ORDER BY position ASC, id ASC",
        )?;

        let mut contacts = Vec::with_capacity(heads.len());
        for (id, name) in heads {
            let phone_numbers = collect_rows(stmt.query_map(params![id], |row| row.get(0))?)?;
            contacts.push(Contact {
                id,
                name,
                phone_numbers,
            });
        }
        Ok(contacts)
    }
}
