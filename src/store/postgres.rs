use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{OrderStore, StoreError};
use crate::models::{Delivery, Item, Order, Payment};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Four related tables keyed by `order_uid`: the order header, delivery (1:1),
// payment (1:1), and items (1:many). `upsert` replaces the whole aggregate in
// one transaction; `get` reassembles it, tolerating absent 1:1 rows.
//
// Items are replaced with delete-then-insert rather than a diff: it is the
// simplest correct way to express "the item set is exactly what the last
// write supplied", and the surrounding transaction keeps a concurrent reader
// from ever observing the order with its items half-replaced.
// ============================================================================

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema migrations bundled with the binary.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders(
              order_uid, track_number, entry, locale, internal_signature,
              customer_id, delivery_service, shardkey, sm_id, date_created,
              oof_shard, updated_at
            ) VALUES($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11, now())
            ON CONFLICT(order_uid) DO UPDATE SET
              track_number=EXCLUDED.track_number,
              entry=EXCLUDED.entry,
              locale=EXCLUDED.locale,
              internal_signature=EXCLUDED.internal_signature,
              customer_id=EXCLUDED.customer_id,
              delivery_service=EXCLUDED.delivery_service,
              shardkey=EXCLUDED.shardkey,
              sm_id=EXCLUDED.sm_id,
              date_created=EXCLUDED.date_created,
              oof_shard=EXCLUDED.oof_shard,
              updated_at=now()
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO deliveries(
              order_uid, name, phone, zip, city, address, region, email
            ) VALUES($1,$2,$3,$4,$5,$6,$7,$8)
            ON CONFLICT(order_uid) DO UPDATE SET
              name=EXCLUDED.name, phone=EXCLUDED.phone, zip=EXCLUDED.zip,
              city=EXCLUDED.city, address=EXCLUDED.address,
              region=EXCLUDED.region, email=EXCLUDED.email
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.delivery.name)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.zip)
        .bind(&order.delivery.city)
        .bind(&order.delivery.address)
        .bind(&order.delivery.region)
        .bind(&order.delivery.email)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO payments(
              order_uid, transaction, request_id, currency, provider,
              amount, payment_dt, bank, delivery_cost, goods_total, custom_fee
            ) VALUES($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            ON CONFLICT(order_uid) DO UPDATE SET
              transaction=EXCLUDED.transaction,
              request_id=EXCLUDED.request_id,
              currency=EXCLUDED.currency,
              provider=EXCLUDED.provider,
              amount=EXCLUDED.amount,
              payment_dt=EXCLUDED.payment_dt,
              bank=EXCLUDED.bank,
              delivery_cost=EXCLUDED.delivery_cost,
              goods_total=EXCLUDED.goods_total,
              custom_fee=EXCLUDED.custom_fee
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.payment.transaction)
        .bind(&order.payment.request_id)
        .bind(&order.payment.currency)
        .bind(&order.payment.provider)
        .bind(order.payment.amount)
        .bind(order.payment.payment_dt)
        .bind(&order.payment.bank)
        .bind(order.payment.delivery_cost)
        .bind(order.payment.goods_total)
        .bind(order.payment.custom_fee)
        .execute(&mut *tx)
        .await?;

        // Replace the item set wholesale: stale items from a previous version
        // of the order must not survive an update that dropped them.
        sqlx::query("DELETE FROM items WHERE order_uid=$1")
            .bind(&order.order_uid)
            .execute(&mut *tx)
            .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO items(
                  order_uid, chrt_id, track_number, price, rid, name,
                  sale, size, total_price, nm_id, brand, status
                ) VALUES($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
                "#,
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        // The header row decides existence; everything else is assembled
        // around it.
        let header = sqlx::query(
            r#"
            SELECT order_uid, track_number, entry, locale, internal_signature,
                   customer_id, delivery_service, shardkey, sm_id,
                   date_created, oof_shard
            FROM orders WHERE order_uid=$1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = header else {
            return Ok(None);
        };

        let mut order = Order {
            order_uid: row.try_get("order_uid")?,
            track_number: row.try_get("track_number")?,
            entry: row.try_get("entry")?,
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            locale: row.try_get("locale")?,
            internal_signature: row.try_get("internal_signature")?,
            customer_id: row.try_get("customer_id")?,
            delivery_service: row.try_get("delivery_service")?,
            shard_key: row.try_get("shardkey")?,
            sm_id: row.try_get("sm_id")?,
            date_created: row.try_get("date_created")?,
            oof_shard: row.try_get("oof_shard")?,
        };

        // Writes keep delivery and payment 1:1 with the header, but the read
        // path does not assume it: an absent row reads as an empty sub-object
        // instead of failing the whole aggregate.
        if let Some(row) = sqlx::query(
            r#"
            SELECT name, phone, zip, city, address, region, email
            FROM deliveries WHERE order_uid=$1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await?
        {
            order.delivery = Delivery {
                name: row.try_get("name")?,
                phone: row.try_get("phone")?,
                zip: row.try_get("zip")?,
                city: row.try_get("city")?,
                address: row.try_get("address")?,
                region: row.try_get("region")?,
                email: row.try_get("email")?,
            };
        }

        if let Some(row) = sqlx::query(
            r#"
            SELECT transaction, request_id, currency, provider,
                   amount, payment_dt, bank, delivery_cost, goods_total,
                   custom_fee
            FROM payments WHERE order_uid=$1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await?
        {
            order.payment = Payment {
                transaction: row.try_get("transaction")?,
                request_id: row.try_get("request_id")?,
                currency: row.try_get("currency")?,
                provider: row.try_get("provider")?,
                amount: row.try_get("amount")?,
                payment_dt: row.try_get("payment_dt")?,
                bank: row.try_get("bank")?,
                delivery_cost: row.try_get("delivery_cost")?,
                goods_total: row.try_get("goods_total")?,
                custom_fee: row.try_get("custom_fee")?,
            };
        }

        // chrt_id ordering keeps reads deterministic for the same state.
        let rows = sqlx::query(
            r#"
            SELECT chrt_id, track_number, price, rid, name, sale, size,
                   total_price, nm_id, brand, status
            FROM items WHERE order_uid=$1 ORDER BY chrt_id
            "#,
        )
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            order.items.push(Item {
                chrt_id: row.try_get("chrt_id")?,
                track_number: row.try_get("track_number")?,
                price: row.try_get("price")?,
                rid: row.try_get("rid")?,
                name: row.try_get("name")?,
                sale: row.try_get("sale")?,
                size: row.try_get("size")?,
                total_price: row.try_get("total_price")?,
                nm_id: row.try_get("nm_id")?,
                brand: row.try_get("brand")?,
                status: row.try_get("status")?,
            });
        }

        Ok(Some(order))
    }

    async fn load_recent(&self, n: i64) -> Result<Vec<Order>, StoreError> {
        let ids = self.list_recent_ids(n).await?;

        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.get(&id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn list_recent_ids(&self, n: i64) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT order_uid FROM orders ORDER BY updated_at DESC LIMIT $1",
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("order_uid")?);
        }
        Ok(ids)
    }
}
