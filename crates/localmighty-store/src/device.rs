use rusqlite::params;

use localmighty_shared::types::DeviceStatus;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// The last reported device status. All zeros until the phone reports.
    pub fn get_device_status(&self) -> Result<DeviceStatus> {
        self.conn()
            .query_row(
                "SELECT battery_level, is_charging, wifi_connected, last_seen
                 FROM device_status WHERE id = 1",
                [],
                |row| {
                    Ok(DeviceStatus {
                        battery_level: row.get(0)?,
                        is_charging: row.get(1)?,
                        wifi_connected: row.get(2)?,
                        last_seen: row.get(3)?,
                    })
                },
            )
            .map_err(Into::into)
    }

    /// Replace the singleton wholesale. `last_seen` is taken as given.
    pub fn overwrite_device_status(&self, status: &DeviceStatus) -> Result<()> {
        self.conn().execute(
            "INSERT INTO device_status (id, battery_level, is_charging, wifi_connected, last_seen)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                battery_level = excluded.battery_level,
                is_charging = excluded.is_charging,
                wifi_connected = excluded.wifi_connected,
                last_seen = excluded.last_seen",
            params![
                status.battery_level,
                status.is_charging,
                status.wifi_connected,
                status.last_seen,
            ],
        )?;
        Ok(())
    }
}
